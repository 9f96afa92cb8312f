//! Import merge engine: strategies, conflict resolution, ordering.

mod support;

use envlock::core::secrets::{ImportOptions, MergeStrategy};
use envlock::error::{ConfigError, DotenvError, Error, SecretError};
use support::Vault;

fn import(vault: &Vault, data: &str, opts: &ImportOptions) -> envlock::core::secrets::ImportReport {
    vault
        .secrets
        .import_env(&vault.cancel, vault.root(), "app", "dev", data, opts)
        .expect("import failed")
}

#[test]
fn import_into_empty_env_adds_everything() {
    let vault = Vault::new();
    let report = import(&vault, "A=1\nB=2\n", &ImportOptions::default());
    assert_eq!((report.added, report.updated, report.skipped), (2, 0, 0));
    assert_eq!(vault.export(), "A=1\nB=2\n");
}

#[test]
fn prefer_vault_keeps_existing_values() {
    let vault = Vault::with_secrets(&[("A", "vault")]);
    let report = import(&vault, "A=file\nB=new\n", &ImportOptions::default());
    assert_eq!((report.added, report.updated, report.skipped), (1, 0, 1));
    assert_eq!(vault.get("A"), "vault");
    assert_eq!(vault.get("B"), "new");
}

#[test]
fn prefer_file_takes_incoming_values() {
    let vault = Vault::with_secrets(&[("A", "vault")]);
    let report = import(
        &vault,
        "B=2\nA=1\n",
        &ImportOptions {
            strategy: MergeStrategy::PreferFile,
            resolver: None,
        },
    );
    assert_eq!((report.added, report.updated), (1, 1));
    // File order wins in the merged payload.
    assert_eq!(vault.export(), "B=2\nA=1\n");
}

#[test]
fn prefer_vault_skips_identical_values() {
    let vault = Vault::with_secrets(&[("A", "same")]);
    let report = import(&vault, "A=same\n", &ImportOptions::default());
    assert_eq!((report.added, report.updated, report.skipped), (0, 0, 1));
}

#[test]
fn prefer_file_counts_identical_values_as_updated() {
    let vault = Vault::with_secrets(&[("A", "same")]);
    let report = import(
        &vault,
        "A=same\n",
        &ImportOptions {
            strategy: MergeStrategy::PreferFile,
            resolver: None,
        },
    );
    // The strategy applies to every key the file shares with the vault,
    // equal values included.
    assert_eq!((report.added, report.updated, report.skipped), (0, 1, 0));
    assert_eq!(vault.get("A"), "same");
}

#[test]
fn interactive_resolver_is_consulted_even_when_values_match() {
    let vault = Vault::with_secrets(&[("A", "same")]);
    let resolver = |_: &str, _: &str, _: &str| -> envlock::error::Result<String> {
        Ok("resolved".to_string())
    };
    let report = import(
        &vault,
        "A=same\n",
        &ImportOptions {
            strategy: MergeStrategy::Interactive,
            resolver: Some(&resolver),
        },
    );
    assert_eq!((report.updated, report.skipped), (1, 0));
    assert_eq!(vault.get("A"), "resolved");
}

#[test]
fn import_refuses_without_recipients_even_when_nothing_changes() {
    let vault = Vault::with_recipients(&[]);
    let err = vault
        .secrets
        .import_env(
            &vault.cancel,
            vault.root(),
            "app",
            "dev",
            "",
            &ImportOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NoRecipients)));
}

#[test]
fn no_change_import_leaves_payload_untouched() {
    let vault = Vault::with_secrets(&[("A", "1")]);
    let before = vault.raw_payload();
    import(&vault, "A=file\n", &ImportOptions::default());
    assert_eq!(vault.raw_payload(), before);
}

#[test]
fn interactive_resolver_decides_per_key() {
    let vault = Vault::with_secrets(&[("A", "vault-a"), ("B", "vault-b")]);
    let resolver = |key: &str, vault_value: &str, file_value: &str| -> envlock::error::Result<String> {
        Ok(if key == "A" {
            file_value.to_string()
        } else {
            vault_value.to_string()
        })
    };
    let report = import(
        &vault,
        "A=file-a\nB=file-b\n",
        &ImportOptions {
            strategy: MergeStrategy::Interactive,
            resolver: Some(&resolver),
        },
    );
    assert_eq!((report.updated, report.skipped), (1, 1));
    assert_eq!(vault.get("A"), "file-a");
    assert_eq!(vault.get("B"), "vault-b");
}

#[test]
fn interactive_without_resolver_fails_before_any_change() {
    let vault = Vault::with_secrets(&[("A", "vault")]);
    let before = vault.raw_payload();
    let err = vault
        .secrets
        .import_env(
            &vault.cancel,
            vault.root(),
            "app",
            "dev",
            "A=file\nNEW=1\n",
            &ImportOptions {
                strategy: MergeStrategy::Interactive,
                resolver: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::Secret(SecretError::ResolverRequired)));
    assert_eq!(vault.raw_payload(), before);
}

#[test]
fn parse_error_aborts_whole_import() {
    let vault = Vault::with_secrets(&[("A", "1")]);
    let before = vault.raw_payload();
    let err = vault
        .secrets
        .import_env(
            &vault.cancel,
            vault.root(),
            "app",
            "dev",
            "GOOD=1\nNOT A DOTENV LINE\n",
            &ImportOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Dotenv(DotenvError::Parse { line: 2, .. })
    ));
    assert_eq!(vault.raw_payload(), before);
}

#[test]
fn warnings_ride_along_with_a_successful_import() {
    let vault = Vault::new();
    let report = import(&vault, "export A=1\nB=2\nB=3\n", &ImportOptions::default());
    assert_eq!(report.added, 2);
    assert_eq!(report.warnings.len(), 2);
    // Duplicate key keeps the last value at its first-seen position.
    assert_eq!(vault.export(), "A=1\nB=3\n");
}

#[test]
fn comments_and_quoting_parse_like_a_dotenv_file() {
    let vault = Vault::new();
    import(
        &vault,
        "# header\nPLAIN=value # trailing comment\nQUOTED=\"a # not comment\"\nESC=\"line1\\nline2\"\n",
        &ImportOptions::default(),
    );
    assert_eq!(vault.get("PLAIN"), "value");
    assert_eq!(vault.get("QUOTED"), "a # not comment");
    assert_eq!(vault.get("ESC"), "line1\nline2");
}

#[test]
fn import_report_is_deterministic_across_runs() {
    for _ in 0..3 {
        let vault = Vault::with_secrets(&[("B", "vault-b")]);
        let report = import(
            &vault,
            "B=2\nA=1\n",
            &ImportOptions {
                strategy: MergeStrategy::PreferFile,
                resolver: None,
            },
        );
        assert_eq!((report.updated, report.added), (1, 1));
        assert_eq!(vault.export(), "B=2\nA=1\n");
    }
}
