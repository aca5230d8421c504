use libsql::params;
use ulid::Ulid;

use super::models::QuestionRow;
use super::Db;
use crate::error::{Error, Result};
use crate::models::{NewQuestion, Question, QuestionFilter};

impl Db {
    /// Load a batch of published questions. This is the seam the external
    /// content pipeline writes through; the engine itself only reads.
    pub async fn load_questions(&self, questions: Vec<NewQuestion>) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let tx = conn.transaction().await?;

        let mut ids = Vec::with_capacity(questions.len());
        for q in questions {
            let id = Ulid::new().to_string();
            tx.execute(
                r#"
                INSERT INTO questions
                    (id, category, subject_category, difficulty, question, options, correct_index, explanation, refs)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    id.clone(),
                    q.category,
                    q.subject_category,
                    q.difficulty.as_str(),
                    q.question,
                    serde_json::to_string(&q.options)?,
                    q.correct_index,
                    q.explanation,
                    serde_json::to_string(&q.references)?
                ],
            )
            .await?;
            ids.push(id);
        }

        tx.commit().await?;

        tracing::info!("loaded {} questions into the pool", ids.len());
        Ok(ids)
    }

    pub async fn get_question(&self, question_id: &str) -> Result<Question> {
        let conn = self.connect()?;
        let row = conn
            .query(
                r#"
                SELECT id, category, subject_category, difficulty, question,
                       options, correct_index, explanation, refs
                FROM questions WHERE id = ?
                "#,
                params![question_id],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| Error::QuestionNotFound(question_id.to_owned()))?;

        libsql::de::from_row::<QuestionRow>(&row)?.into_question()
    }

    pub async fn get_questions_by_filter(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, category, subject_category, difficulty, question,
                       options, correct_index, explanation, refs
                FROM questions
                WHERE (? IS NULL OR category = ?)
                  AND (? IS NULL OR difficulty = ?)
                ORDER BY id
                "#,
                params![
                    filter.category.clone(),
                    filter.category.clone(),
                    filter.difficulty.map(|d| d.as_str()),
                    filter.difficulty.map(|d| d.as_str())
                ],
            )
            .await?;

        let mut questions = Vec::new();
        while let Some(row) = rows.next().await? {
            questions.push(libsql::de::from_row::<QuestionRow>(&row)?.into_question()?);
        }
        Ok(questions)
    }

    /// Ids of all pool questions matching the filter, in stable id order.
    pub async fn question_ids_by_filter(&self, filter: &QuestionFilter) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id FROM questions
                WHERE (? IS NULL OR category = ?)
                  AND (? IS NULL OR difficulty = ?)
                ORDER BY id
                "#,
                params![
                    filter.category.clone(),
                    filter.category.clone(),
                    filter.difficulty.map(|d| d.as_str()),
                    filter.difficulty.map(|d| d.as_str())
                ],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    pub async fn questions_count(&self) -> Result<i64> {
        let conn = self.connect()?;
        let count = conn
            .query("SELECT COUNT(*) FROM questions", ())
            .await?
            .next()
            .await?
            .ok_or_else(|| Error::Corrupt("count query returned no row".into()))?
            .get::<i64>(0)?;
        Ok(count)
    }
}
