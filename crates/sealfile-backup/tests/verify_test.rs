//! Offline metadata signature verification.

mod common;

use common::{engine, foreign_engine, memory_store};
use sealfile_backup::{BackupPipeline, MetadataVerifier};
use sealfile_core::{BackupMetadata, SealError};
use sealfile_crypto::PublicKey;

async fn signed_record() -> BackupMetadata {
    BackupPipeline::new(engine(), memory_store())
        .backup(b"hello", "hello.txt")
        .await
        .unwrap()
        .metadata
}

fn flip_hex_char(s: &str, at: usize) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[at] = if chars[at] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

#[tokio::test]
async fn fresh_record_verifies() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let m = signed_record().await;
    assert!(verifier.verify(&m).unwrap());
    assert!(verifier.verify_json(&m.to_json().unwrap()).unwrap());
}

#[tokio::test]
async fn verification_is_repeatable() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let m = signed_record().await;
    let before = m.clone();
    for _ in 0..3 {
        assert!(verifier.verify(&m).unwrap());
    }
    assert_eq!(m, before);
}

#[tokio::test]
async fn public_key_alone_is_enough() {
    let pem = engine().public_key().to_pem().unwrap();
    let verifier = MetadataVerifier::new(PublicKey::from_pem(&pem).unwrap());
    assert!(verifier.verify(&signed_record().await).unwrap());
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let mut m = signed_record().await;
    m.signature = flip_hex_char(&m.signature, 10);
    assert!(!verifier.verify(&m).unwrap());
}

#[tokio::test]
async fn every_signed_field_is_covered() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let original = signed_record().await;

    let tampered: Vec<(&str, BackupMetadata)> = vec![
        ("filename", BackupMetadata { filename: "evil.txt".into(), ..original.clone() }),
        (
            "timestamp",
            BackupMetadata { timestamp: "1999-01-01T00:00:00.000Z".into(), ..original.clone() },
        ),
        ("version", BackupMetadata { version: 2, ..original.clone() }),
        ("iv", BackupMetadata { iv: flip_hex_char(&original.iv, 0), ..original.clone() }),
        (
            "symmetricKey",
            BackupMetadata {
                symmetric_key: flip_hex_char(&original.symmetric_key, 5),
                ..original.clone()
            },
        ),
        (
            "fileHash",
            BackupMetadata { file_hash: flip_hex_char(&original.file_hash, 63), ..original.clone() },
        ),
    ];

    for (field, m) in tampered {
        assert!(!verifier.verify(&m).unwrap(), "tampered {field} still verified");
    }
}

#[tokio::test]
async fn foreign_signer_is_rejected() {
    let verifier = MetadataVerifier::from_engine(&foreign_engine());
    assert!(!verifier.verify(&signed_record().await).unwrap());
}

#[tokio::test]
async fn structurally_broken_records_are_validation_errors() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let m = signed_record().await;

    let mut value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("iv");
    let err = verifier.verify_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, SealError::Validation(_)), "{err:?}");

    let mut value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
    value["extra"] = serde_json::json!("field");
    assert!(matches!(
        verifier.verify_json(&value.to_string()),
        Err(SealError::Validation(_))
    ));

    let short_iv = BackupMetadata { iv: "abcd".into(), ..m.clone() };
    assert!(matches!(verifier.verify(&short_iv), Err(SealError::Validation(_))));

    let not_hex = BackupMetadata { signature: "zz".into(), ..m };
    assert!(matches!(verifier.verify(&not_hex), Err(SealError::Validation(_))));

    assert!(matches!(
        verifier.verify_json("not json"),
        Err(SealError::Validation(_))
    ));
}

#[tokio::test]
async fn case_changed_signature_is_not_accepted() {
    let verifier = MetadataVerifier::from_engine(&engine());
    let mut m = signed_record().await;
    let at = m
        .signature
        .find(|c: char| c.is_ascii_lowercase())
        .expect("hex signature has a letter");
    let mut chars: Vec<char> = m.signature.chars().collect();
    chars[at] = chars[at].to_ascii_uppercase();
    let changed: String = chars.into_iter().collect();
    assert_ne!(changed, m.signature);
    assert!(changed.eq_ignore_ascii_case(&m.signature));
    m.signature = changed;

    assert!(matches!(verifier.verify(&m), Err(SealError::Validation(_))));
    assert!(!matches!(verifier.verify_json(&m.to_json().unwrap()), Ok(true)));
}
