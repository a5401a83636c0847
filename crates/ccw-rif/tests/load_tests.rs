//! Load bookkeeping and loader tests

mod common;

use ccw_rif::load::{
    InMemoryLoadSink, LoadAction, LoadedBatch, LoadedBatchBuilder, RifLoadSink, RifLoader,
    SkipReasonCode,
};
use ccw_rif::{LoadOptions, RifError, RifFile, RifFileType, RifFilesEvent, RifFilesProcessor};
use chrono::{Duration, Utc};
use common::*;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// LoadedBatch
// ============================================================================

#[test]
fn test_beneficiary_list_round_trip() {
    let file = Uuid::new_v4();
    for ids in [vec![], vec!["1"], vec!["1", "22", "333"]] {
        let batch = LoadedBatch::new(file, &ids, Utc::now()).unwrap();
        let restored = LoadedBatch::from_parts(
            batch.id(),
            batch.loaded_file_id(),
            batch.beneficiaries_text(),
            batch.created(),
        );
        assert_eq!(restored.beneficiaries(), ids);
    }
}

#[test]
fn test_empty_list_is_not_one_empty_id() {
    let batch = LoadedBatch::from_parts(Uuid::new_v4(), Uuid::new_v4(), "", Utc::now());
    assert_eq!(batch.beneficiaries(), Vec::<String>::new());
}

#[test]
fn test_combine_properties() {
    let file = Uuid::new_v4();
    let now = Utc::now();
    let a = LoadedBatch::new(file, &["1", "2"], now).unwrap();
    let b = LoadedBatch::new(file, &["3", "4", "5"], now - Duration::minutes(1)).unwrap();

    let ab = a.combine(Some(&b)).unwrap();
    let ba = b.combine(Some(&a)).unwrap();
    assert_eq!(ab.beneficiary_count(), 5);
    assert_eq!(ab.created(), now);
    assert_eq!(ba.created(), now);

    let mut ab_ids = ab.beneficiaries();
    let mut ba_ids = ba.beneficiaries();
    ab_ids.sort();
    ba_ids.sort();
    assert_eq!(ab_ids, ba_ids);

    assert_eq!(a.combine(None).unwrap(), a);
}

#[test]
fn test_builder_stamps_at_build_time() {
    let before = Utc::now();
    let builder = LoadedBatchBuilder::new(Uuid::new_v4(), 2);
    builder.associate_beneficiary("1").unwrap();
    builder.associate_beneficiary("2").unwrap();
    let batch = builder.build();

    assert!(batch.created() >= before);
    assert_eq!(batch.beneficiaries(), vec!["1", "2"]);
}

// ============================================================================
// RifLoader
// ============================================================================

fn data_set(files: Vec<RifFile>) -> RifFilesEvent {
    RifFilesEvent::new(Utc::now(), false, files).unwrap()
}

fn carrier_file(claims: usize) -> RifFile {
    let mut lines = Vec::new();
    for claim in 0..claims {
        lines.push(carrier_line("INSERT", &format!("{}", claim % 3), &format!("C{}", claim), 1));
        lines.push(carrier_line("INSERT", &format!("{}", claim % 3), &format!("C{}", claim), 2));
    }
    RifFile::in_memory("carrier.txt", RifFileType::Carrier, delimited(CARRIER_HEADER, &lines))
}

fn beneficiary_file(lines: &[String]) -> RifFile {
    RifFile::in_memory("bene.txt", RifFileType::Beneficiary, delimited(BENEFICIARY_HEADER, lines))
}

fn loader(options: LoadOptions, sink: Arc<InMemoryLoadSink>) -> RifLoader {
    RifLoader::new(options, RifFilesProcessor::new(), sink)
}

#[tokio::test]
async fn test_loads_data_set_in_batches() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let options = LoadOptions {
        record_batch_size: 2,
        ..LoadOptions::default()
    };
    let event = data_set(vec![
        carrier_file(5),
        beneficiary_file(&[
            beneficiary_line("INSERT", "0", "2018"),
            beneficiary_line("INSERT", "1", "2018"),
            beneficiary_line("INSERT", "2", "2018"),
        ]),
    ]);

    let stats = loader(options, sink.clone()).process(&event).await.unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].file_type, RifFileType::Beneficiary);
    assert_eq!(stats[0].inserted, 3);
    assert_eq!(stats[0].batches, 2);
    assert_eq!(stats[1].file_type, RifFileType::Carrier);
    assert_eq!(stats[1].records, 5);
    assert_eq!(stats[1].batches, 3);

    assert_eq!(sink.loaded_files().await.len(), 2);
    assert_eq!(sink.record_count().await, 8);
    let claim = sink.record(RifFileType::Carrier, "C4").await.unwrap();
    assert_eq!(claim.beneficiary_id, "1");

    let carrier_batches: Vec<_> = sink
        .loaded_batches()
        .await
        .into_iter()
        .filter(|b| b.loaded_file_id() == stats[1].loaded_file_id)
        .collect();
    let total: usize = carrier_batches.iter().map(LoadedBatch::beneficiary_count).sum();
    assert_eq!(total, 5);
}

#[tokio::test]
async fn test_idempotent_rerun_does_nothing() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let loader = loader(LoadOptions::default(), sink.clone());
    let event = data_set(vec![beneficiary_file(&[beneficiary_line("INSERT", "7", "2018")])]);

    let first = loader.process(&event).await.unwrap();
    let second = loader.process(&event).await.unwrap();

    assert_eq!(first[0].inserted, 1);
    assert_eq!(second[0].inserted, 0);
    assert_eq!(second[0].did_nothing, 1);
    assert_eq!(sink.record_count().await, 1);
}

#[tokio::test]
async fn test_non_idempotent_update_overwrites() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let options = LoadOptions {
        idempotent: false,
        ..LoadOptions::default()
    };
    let loader = loader(options, sink.clone());

    loader
        .process(&data_set(vec![beneficiary_file(&[beneficiary_line("INSERT", "7", "2018")])]))
        .await
        .unwrap();
    let updated_line = beneficiary_line("UPDATE", "7", "2018").replace("|Doe|", "|Roe|");
    let stats = loader
        .process(&data_set(vec![beneficiary_file(&[updated_line])]))
        .await
        .unwrap();

    assert_eq!(stats[0].updated, 1);
    let stored = sink.record(RifFileType::Beneficiary, "7").await.unwrap();
    let bene = stored.record.as_beneficiary().unwrap();
    assert_eq!(bene.surname, "Roe");
}

#[tokio::test]
async fn test_delete_is_unsupported() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let event = data_set(vec![beneficiary_file(&[beneficiary_line("DELETE", "7", "2018")])]);

    let result = loader(LoadOptions::default(), sink.clone()).process(&event).await;
    assert!(matches!(result, Err(RifError::UnsupportedRecordAction { .. })));
    assert_eq!(sink.record_count().await, 0);
}

#[tokio::test]
async fn test_enrollment_year_filter() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let options = LoadOptions {
        filter_enrollment_year: Some(2019),
        ..LoadOptions::default()
    };
    let event = data_set(vec![beneficiary_file(&[
        beneficiary_line("INSERT", "1", "2019"),
        beneficiary_line("UPDATE", "2", "2018"),
        beneficiary_line("UPDATE", "3", ""),
    ])]);

    let stats = loader(options.clone(), sink.clone()).process(&event).await.unwrap();
    assert_eq!(stats[0].inserted, 2);
    assert_eq!(stats[0].skipped, 1);

    let skipped = sink.skipped().await;
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].beneficiary_id, "2");
    assert_eq!(skipped[0].skip_reason, SkipReasonCode::DelayedBackdatedEnrollment);
    assert!(skipped[0].rif_data.starts_with("UPDATE|2|MO|"));

    let batch = sink.loaded_batches().await.pop().unwrap();
    assert_eq!(batch.beneficiaries(), vec!["1", "3"]);

    let refused = data_set(vec![beneficiary_file(&[beneficiary_line("INSERT", "4", "2018")])]);
    assert!(matches!(
        loader(options, sink).process(&refused).await,
        Err(RifError::Rejected(_))
    ));
}

#[tokio::test]
async fn test_failed_claim_file_does_not_stop_siblings() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let broken = RifFile::in_memory(
        "dme.txt",
        RifFileType::Dme,
        delimited(CARRIER_HEADER, &[carrier_line("XYZ", "1", "D1", 1)]),
    );
    let event = data_set(vec![broken, carrier_file(2)]);

    let result = loader(LoadOptions::default(), sink.clone()).process(&event).await;
    assert!(matches!(result, Err(RifError::UnknownRecordAction(_))));
    assert!(sink.record(RifFileType::Carrier, "C1").await.is_some());
}

#[tokio::test]
async fn test_compacts_batches_after_load() {
    let sink = Arc::new(InMemoryLoadSink::new());
    let options = LoadOptions {
        record_batch_size: 1,
        compact_batches: true,
        ..LoadOptions::default()
    };

    let stats = loader(options, sink.clone())
        .process(&data_set(vec![carrier_file(4)]))
        .await
        .unwrap();

    assert_eq!(stats[0].batches, 4);
    let batches = sink.loaded_batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].beneficiaries(), vec!["0", "1", "2", "0"]);
    assert!(sink.compact_batches(Uuid::new_v4()).await.unwrap().is_none());
}
