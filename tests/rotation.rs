//! Recipient management and key rotation.

mod support;

use envlock::error::{ConfigError, Error, SecretError};
use support::{Vault, TEST_RECIPIENT};

#[test]
fn add_and_list_recipients() {
    let vault = Vault::new();
    assert!(vault.keys.add(vault.root(), "age1bob").unwrap());
    assert!(!vault.keys.add(vault.root(), "age1bob").unwrap());
    assert_eq!(
        vault.keys.list(vault.root()).unwrap(),
        vec![TEST_RECIPIENT, "age1bob"]
    );
}

#[test]
fn remove_recipient_but_never_the_last_one() {
    let vault = Vault::new();
    vault.keys.add(vault.root(), "age1bob").unwrap();
    assert!(vault.keys.remove(vault.root(), "age1bob").unwrap());
    assert!(!vault.keys.remove(vault.root(), "age1bob").unwrap());

    let err = vault.keys.remove(vault.root(), TEST_RECIPIENT).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NoRecipients)));
}

#[test]
fn rotate_reencrypts_for_current_recipients() {
    let vault = Vault::with_secrets(&[("A", "1")]);
    vault.keys.add(vault.root(), "age1bob").unwrap();

    let report = vault.keys.rotate(&vault.cancel, vault.root()).unwrap();
    assert_eq!((report.total, report.rotated, report.failed), (1, 1, 0));

    // The last encryption targeted the expanded recipient set.
    let recorded = vault.encrypter.encrypt_recipients.lock().unwrap();
    let last = recorded.last().unwrap();
    assert_eq!(last, &vec![TEST_RECIPIENT.to_string(), "age1bob".to_string()]);

    drop(recorded);
    assert_eq!(vault.get("A"), "1");
}

#[test]
fn rotate_covers_blobs_too() {
    let vault = Vault::with_secrets(&[("A", "1")]);
    vault
        .files
        .put(&vault.cancel, vault.root(), "app", "dev", "cert.pem", b"PEM BYTES")
        .unwrap();

    let report = vault.keys.rotate(&vault.cancel, vault.root()).unwrap();
    assert_eq!((report.total, report.rotated), (2, 2));

    let (plaintext, _) = vault
        .files
        .get(&vault.cancel, vault.root(), "app", "dev", "cert.pem")
        .unwrap();
    assert_eq!(plaintext, b"PEM BYTES");
}

#[test]
fn rotate_on_empty_vault_fails() {
    let vault = Vault::new();
    let err = vault.keys.rotate(&vault.cancel, vault.root()).unwrap_err();
    assert!(matches!(err, Error::Secret(SecretError::NothingToRotate)));
}

#[test]
fn rotation_continues_past_a_corrupt_file() {
    let vault = Vault::new();
    vault.set("A", "1");
    vault
        .secrets
        .set(&vault.cancel, vault.root(), "app", "prod", "B", "2")
        .unwrap();

    // Corrupt one payload; rotation should report it and rotate the other.
    std::fs::write(vault.secret_path(), b"not an envelope").unwrap();

    let report = vault.keys.rotate(&vault.cancel, vault.root()).unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.rotated, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);

    let survivor = vault
        .secrets
        .get(&vault.cancel, vault.root(), "app", "prod", "B")
        .unwrap();
    assert_eq!(survivor, "2");
}
