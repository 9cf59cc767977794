#![allow(missing_docs)]

use ftpgate_auth_jsonfile::{JsonFileAccountRepository, JsonFileProvisions};
use ftpgate_core::{
    account::{DriverKind, PasswordSecret},
    command::{CommandToken, Permission},
    repository::{AccountRepository, ProvisionResolver},
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn input_file_path(filename: &str) -> PathBuf {
    let root_dir = std::env::var("CARGO_MANIFEST_DIR").expect("Could not find CARGO_MANIFEST_DIR in environment");
    let mut path = PathBuf::from(root_dir);
    path.push("tests/fixtures");
    path.push(filename);
    path
}

#[tokio::test(flavor = "current_thread")]
async fn accounts_from_file() {
    let repo = JsonFileAccountRepository::from_file(input_file_path("accounts.json")).unwrap();

    let alice = repo.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(alice.home_directory, "/mnt/alice");
    assert!(alice.permissions.contains(&Permission::Deny(CommandToken::Stor)));
    assert!(matches!(alice.secret, PasswordSecret::Pbkdf2 { .. }));

    let bella = repo.find_by_username("bella").await.unwrap().unwrap();
    assert_eq!(bella.driver, DriverKind::ObjectStorage);
    assert_eq!(bella.quota, 1048576);
    assert_eq!(bella.permissions, Permission::defaults());
}

#[tokio::test(flavor = "current_thread")]
async fn created_accounts_are_written_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    std::fs::copy(input_file_path("accounts.json"), &path).unwrap();

    let repo = JsonFileAccountRepository::from_file(&path).unwrap();
    let mut dave = repo.find_by_username("alice").await.unwrap().unwrap();
    dave.username = "dave".to_string();
    dave.secret = PasswordSecret::Plaintext {
        password: "davespassword".to_string(),
    };
    dave.home_directory = "/mnt/dave".to_string();
    repo.create(dave).await.unwrap();

    let reloaded = JsonFileAccountRepository::from_file(&path).unwrap();
    let dave = reloaded.find_by_username("dave").await.unwrap().unwrap();
    assert_eq!(dave.home_directory, "/mnt/dave");
    assert!(reloaded.find_by_username("alice").await.unwrap().is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn updates_are_written_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.json");
    std::fs::copy(input_file_path("accounts.json"), &path).unwrap();

    let repo = JsonFileAccountRepository::from_file(&path).unwrap();
    let mut bella = repo.find_by_username("bella").await.unwrap().unwrap();
    bella.quota = 42;
    repo.update(bella).await.unwrap();

    let reloaded = JsonFileAccountRepository::from_file(&path).unwrap();
    assert_eq!(reloaded.find_by_username("bella").await.unwrap().unwrap().quota, 42);
}

#[tokio::test(flavor = "current_thread")]
async fn provisions_from_file() {
    let provisions = JsonFileProvisions::from_file(input_file_path("provisions.json")).unwrap();
    assert_eq!(provisions.resolve("prov-1").await.unwrap().unwrap().path, "acme/incoming");
    assert!(provisions.resolve("prov-9").await.unwrap().is_none());
}
