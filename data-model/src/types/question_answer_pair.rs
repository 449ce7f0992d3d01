//! Extractive question answering annotations.

use super::insert_all;
use crate::{
    common::*,
    field::{FieldSpec, FieldType, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};

pub const MODULE: &str = "generic.question_answer_pair";

static QUESTION_ANSWER_PAIR: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "QuestionAnswerPair")
        .counterpart("generic.question_answer_pair.TensorQuestionAnswerPair")
        .field(FieldSpec::new("id", FieldType::Int))
        .field(FieldSpec::new("question_text", FieldType::Str))
        .field(FieldSpec::new("answer_start", FieldType::ListInt))
        .field(FieldSpec::new("answer_end", FieldType::ListInt))
        .field(FieldSpec::new("answer_text", FieldType::ListStr))
        .validator(check_answer_lengths)
        .build()
        .expect("the built-in QuestionAnswerPair schema is well-formed")
});

static TENSOR_QUESTION_ANSWER_PAIR: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorQuestionAnswerPair")
        .counterpart("generic.question_answer_pair.QuestionAnswerPair")
        .field(FieldSpec::new("id", FieldType::Tensor(TensorSpec::int(0))))
        .field(FieldSpec::new("question_text", FieldType::Str))
        .field(FieldSpec::new("answer_start", FieldType::Tensor(TensorSpec::int(1))))
        .field(FieldSpec::new("answer_end", FieldType::Tensor(TensorSpec::int(1))))
        .field(FieldSpec::new("answer_text", FieldType::ListStr))
        .build()
        .expect("the built-in TensorQuestionAnswerPair schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[&QUESTION_ANSWER_PAIR, &TENSOR_QUESTION_ANSWER_PAIR],
    );
}

/// A question with its answer spans. Every answer has a start, an end and a text.
pub struct QuestionAnswerPair;

impl QuestionAnswerPair {
    pub fn schema() -> &'static RecordSchema {
        &QUESTION_ANSWER_PAIR
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_QUESTION_ANSWER_PAIR
    }

    pub fn new(
        id: i64,
        question_text: impl Into<String>,
        answers: &[(i64, i64, &str)],
    ) -> Result<Record> {
        let starts = answers.iter().map(|&(start, _, _)| start).collect_vec();
        let ends = answers.iter().map(|&(_, end, _)| end).collect_vec();
        let texts = answers.iter().map(|&(_, _, text)| text).collect_vec();
        let question_text: String = question_text.into();
        Record::new(
            Self::schema(),
            [
                ("id", FieldValue::from(id)),
                ("question_text", question_text.into()),
                ("answer_start", starts.into()),
                ("answer_end", ends.into()),
                ("answer_text", texts.into()),
            ],
        )
    }
}

fn check_answer_lengths(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let len = |name: &str| -> Result<usize> {
        Ok(record.get(name)?.as_list().map_or(0, |list| list.len()))
    };
    let starts = len("answer_start")?;
    let ends = len("answer_end")?;
    let texts = len("answer_text")?;
    ensure!(
        starts == ends && ends == texts,
        DataModelError::validation(
            "answer_start",
            format!(
                "got {} answer starts, {} answer ends and {} answer texts",
                starts, ends, texts
            )
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_must_align() {
        let pair = QuestionAnswerPair::new(7, "who?", &[(0, 3, "Ada"), (10, 15, "Grace")]).unwrap();
        assert_eq!(pair.get("answer_end").unwrap().to_int_vec().unwrap(), vec![3, 15]);

        let misaligned = Record::new(
            QuestionAnswerPair::schema(),
            [
                ("id", FieldValue::from(1)),
                ("question_text", "why?".into()),
                ("answer_start", vec![0i64, 1].into()),
                ("answer_end", vec![2i64].into()),
                ("answer_text", vec!["a", "b"].into()),
            ],
        );
        assert!(misaligned.is_err());
    }

    #[test]
    fn pairs_to_tensor() {
        let pair = QuestionAnswerPair::new(7, "who?", &[(0, 3, "Ada")]).unwrap();
        let tensor = pair.to_tensor().unwrap();
        assert_eq!(tensor.get_tensor("answer_start").unwrap().size(), vec![1]);
        assert_eq!(tensor.get_tensor("id").unwrap().kind(), Kind::Int64);
        assert_eq!(tensor.to_raw().unwrap(), pair);

        let unanswered = QuestionAnswerPair::new(8, "when?", &[]).unwrap();
        let tensor = unanswered.to_tensor().unwrap();
        assert_eq!(tensor.get_tensor("answer_end").unwrap().size(), vec![0]);
    }
}
