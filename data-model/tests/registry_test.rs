use anyhow::Result;
use data_model::{
    registry::{self, with_registry},
    BatchPolicy, FieldSpec, FieldType, Record, RecordSchema, ResolutionError, TensorSpec,
};

const MODULE: &str = "test.scores";

fn page_score_pair() -> Result<(&'static RecordSchema, &'static RecordSchema)> {
    let raw = RecordSchema::raw(MODULE, "PageScore")
        .counterpart("test.scores.TensorPageScore")
        .field(FieldSpec::new("score", FieldType::Float))
        .field(
            FieldSpec::new("source", FieldType::Str)
                .optional()
                .batch(BatchPolicy::Merge),
        )
        .build_static()?;
    let tensor = RecordSchema::tensor(MODULE, "TensorPageScore")
        .counterpart("test.scores.PageScore")
        .field(FieldSpec::new("score", FieldType::Tensor(TensorSpec::float(0))))
        .field(
            FieldSpec::new("source", FieldType::Str)
                .optional()
                .batch(BatchPolicy::Merge),
        )
        .build_static()?;
    Ok((raw, tensor))
}

#[test]
fn user_defined_pair() -> Result<()> {
    let (raw, tensor) = page_score_pair()?;
    registry::register_pair(raw, tensor)?;

    let resolved = registry::resolve("test.scores.PageScore")?;
    assert!(std::ptr::eq(resolved.counterpart_schema()?, tensor));

    let scores = [0.25, 0.75]
        .iter()
        .map(|&score| Record::new(raw, [("score", score)])?.to_tensor())
        .collect::<Result<Vec<_>>>()?;
    let batched = Record::batched(&scores)?;
    assert_eq!(batched.get_tensor("score")?.size(), vec![2]);
    assert!(batched.get("source")?.is_none());

    with_registry(|registry| registry.validate())?;
    Ok(())
}

#[test]
fn mismatched_pair_is_rejected() -> Result<()> {
    let raw = RecordSchema::raw("test.broken", "Note")
        .counterpart("test.broken.TensorNote")
        .field(FieldSpec::new("text", FieldType::Str))
        .build_static()?;
    let tensor = RecordSchema::tensor("test.broken", "TensorNote")
        .counterpart("test.broken.Note")
        .field(FieldSpec::new("body", FieldType::Str))
        .build_static()?;
    assert!(registry::register_pair(raw, tensor).is_err());
    assert!(matches!(
        registry::resolve("test.broken.Note"),
        Err(ResolutionError::ModuleNotFound { .. })
    ));
    Ok(())
}

#[test]
fn unresolved_counterpart() -> Result<()> {
    let orphan = RecordSchema::raw("test.orphan", "Orphan")
        .counterpart("test.orphan.TensorOrphan")
        .field(FieldSpec::new("value", FieldType::Int))
        .build_static()?;
    let record = Record::new(orphan, [("value", 1i64)])?;
    let err = record.to_tensor().unwrap_err();
    assert!(format!("{:#}", err).contains("test.orphan"));
    Ok(())
}
