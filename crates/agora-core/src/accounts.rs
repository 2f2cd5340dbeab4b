//! # Account Registry
//!
//! Registration, lookup and profile edits.
//!
//! Usernames and e-mail addresses are normalized (trimmed, lowercased) before
//! validation; uniqueness is enforced by the store. Follow relations are not
//! touched here, see [`crate::follow`].

use crate::media::{self, BlobStore};
use crate::primitives::{
    MAX_BIO_LENGTH, MAX_COMMIT_ATTEMPTS, MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH,
};
use crate::store::DocumentStore;
use crate::{Account, AccountDraft, AccountId, AgoraError};
use std::path::Path;
use tracing::{debug, warn};

/// Changes to an account's details. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

impl AccountPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.bio.is_none()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Trim, lowercase and validate a username.
pub fn normalize_username(raw: &str) -> Result<String, AgoraError> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AgoraError::InvalidInput(format!(
            "Username must be 1 to {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err(AgoraError::InvalidInput(
            "Username may only contain a-z, 0-9, '_' and '.'".to_string(),
        ));
    }
    Ok(username)
}

/// Trim, lowercase and validate an e-mail address.
pub fn normalize_email(raw: &str) -> Result<String, AgoraError> {
    let email = raw.trim().to_lowercase();
    let well_formed = email.len() <= MAX_EMAIL_LENGTH
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(AgoraError::InvalidInput(format!(
            "'{}' is not a valid e-mail address",
            raw.trim()
        )));
    }
    Ok(email)
}

fn normalize_bio(raw: &str) -> Result<String, AgoraError> {
    let bio = raw.trim();
    if bio.len() > MAX_BIO_LENGTH {
        return Err(AgoraError::InvalidInput(format!(
            "Bio exceeds {} bytes",
            MAX_BIO_LENGTH
        )));
    }
    Ok(bio.to_string())
}

/// Load an account or fail with `NotFound`.
pub(crate) fn require_account<S: DocumentStore>(
    store: &S,
    id: AccountId,
) -> Result<Account, AgoraError> {
    store
        .account(id)?
        .ok_or_else(|| AgoraError::account_not_found(id))
}

/// Run a read-modify-commit step, retrying on `StaleRevision`.
///
/// The step must re-read everything it writes so each attempt starts from the
/// latest revisions. Once the attempts run out the stale write is reported as
/// `Conflict`; any other error, uniqueness conflicts included, returns at once.
pub(crate) fn with_retry<S, T>(
    store: &mut S,
    operation: &str,
    mut step: impl FnMut(&mut S) -> Result<T, AgoraError>,
) -> Result<T, AgoraError> {
    let mut attempt = 1;
    loop {
        match step(&mut *store) {
            Err(AgoraError::StaleRevision(message)) if attempt < MAX_COMMIT_ATTEMPTS => {
                warn!(operation, attempt, %message, "Stale revision, retrying");
                attempt += 1;
            }
            Err(AgoraError::StaleRevision(message)) => return Err(AgoraError::Conflict(message)),
            other => return other,
        }
    }
}

// =============================================================================
// ACCOUNT REGISTRY
// =============================================================================

/// The AccountRegistry owns account creation and profile edits.
pub struct AccountRegistry;

impl AccountRegistry {
    /// Register a new account.
    ///
    /// An optional profile picture is uploaded first; if the upload fails the
    /// account is created without one.
    pub fn register<S: DocumentStore>(
        store: &mut S,
        blobs: &dyn BlobStore,
        draft: AccountDraft,
        profile_pic: Option<&Path>,
    ) -> Result<Account, AgoraError> {
        let username = normalize_username(&draft.username)?;
        let email = normalize_email(&draft.email)?;
        let bio = normalize_bio(&draft.bio)?;

        let uploaded = profile_pic.and_then(|path| {
            let stored = blobs.upload(path);
            if stored.is_none() {
                warn!(%username, "Profile picture upload failed, registering without one");
            }
            stored.map(|m| m.url)
        });
        let picture = uploaded.clone().or(draft.profile_pic);

        let result = store.insert_account(AccountDraft {
            username,
            email,
            bio,
            profile_pic: picture,
        });
        match result {
            Ok(account) => {
                debug!(account = %account.id, username = %account.username, "Registered account");
                Ok(account)
            }
            Err(e) => {
                if let Some(url) = uploaded {
                    media::discard(blobs, &url);
                }
                Err(e)
            }
        }
    }

    /// Lookup an account. `NotFound` if absent.
    pub fn account<S: DocumentStore>(store: &S, id: AccountId) -> Result<Account, AgoraError> {
        require_account(store, id)
    }

    /// Change username, e-mail and/or bio.
    ///
    /// At least one field is required. A taken username or e-mail is `Conflict`.
    pub fn update_details<S: DocumentStore>(
        store: &mut S,
        id: AccountId,
        patch: &AccountPatch,
    ) -> Result<Account, AgoraError> {
        if patch.is_empty() {
            return Err(AgoraError::InvalidInput(
                "Provide a username, e-mail or bio to update".to_string(),
            ));
        }
        let username = patch.username.as_deref().map(normalize_username).transpose()?;
        let email = patch.email.as_deref().map(normalize_email).transpose()?;
        let bio = patch.bio.as_deref().map(normalize_bio).transpose()?;

        with_retry(store, "update_details", |store| {
            let mut account = require_account(store, id)?;
            if let Some(username) = &username {
                account.username.clone_from(username);
            }
            if let Some(email) = &email {
                account.email.clone_from(email);
            }
            if let Some(bio) = &bio {
                account.bio.clone_from(bio);
            }
            let mut written = store.commit_accounts(&[account])?;
            written
                .pop()
                .ok_or_else(|| AgoraError::IoError("Commit returned no account".to_string()))
        })
    }

    /// Replace the profile picture.
    ///
    /// The upload is mandatory here: failure is `DependencyFailure`. The old
    /// picture is deleted best-effort once the new one is committed.
    pub fn update_profile_pic<S: DocumentStore>(
        store: &mut S,
        blobs: &dyn BlobStore,
        id: AccountId,
        local: &Path,
    ) -> Result<Account, AgoraError> {
        require_account(store, id)?;
        let stored = blobs.upload(local).ok_or_else(|| {
            AgoraError::DependencyFailure("Profile picture upload failed".to_string())
        })?;

        let result = with_retry(store, "update_profile_pic", |store| {
            let mut account = require_account(store, id)?;
            let previous = account.profile_pic.replace(stored.url.clone());
            let mut written = store.commit_accounts(&[account])?;
            let account = written
                .pop()
                .ok_or_else(|| AgoraError::IoError("Commit returned no account".to_string()))?;
            Ok((account, previous))
        });

        match result {
            Ok((account, previous)) => {
                if let Some(url) = previous {
                    media::discard(blobs, &url);
                }
                Ok(account)
            }
            Err(e) => {
                media::discard(blobs, &stored.url);
                Err(e)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, StoredMedia};
    use crate::store::{AccountKey, MemoryStore};
    use std::cell::RefCell;

    /// Blob store double: records deletes, uploads succeed when `accept` is set.
    #[derive(Default)]
    struct RecordingBlobs {
        accept: bool,
        uploads: RefCell<u32>,
        deleted: RefCell<Vec<String>>,
    }

    impl BlobStore for RecordingBlobs {
        fn upload(&self, _local: &Path) -> Option<StoredMedia> {
            if !self.accept {
                return None;
            }
            let mut n = self.uploads.borrow_mut();
            *n += 1;
            Some(StoredMedia {
                url: format!("https://blobs.test/pic-{}.png", *n),
                kind: MediaKind::Image,
            })
        }

        fn delete(&self, public_id: &str, _url: &str) -> Option<()> {
            self.deleted.borrow_mut().push(public_id.to_string());
            Some(())
        }
    }

    fn draft(name: &str) -> AccountDraft {
        AccountDraft {
            username: name.to_string(),
            email: format!("{}@Example.com", name),
            ..AccountDraft::default()
        }
    }

    #[test]
    fn register_normalizes_username_and_email() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let input = AccountDraft {
            username: "  Ada.L ".to_string(),
            email: " Ada.L@Example.com ".to_string(),
            ..AccountDraft::default()
        };
        let account = AccountRegistry::register(&mut store, &blobs, input, None).expect("register");

        assert_eq!(account.username, "ada.l");
        assert_eq!(account.email, "ada.l@example.com");
        assert!(!account.is_private);
    }

    #[test]
    fn register_rejects_bad_input() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let long = "x".repeat(MAX_USERNAME_LENGTH + 1);
        for bad in ["", "has space", "semi;colon", long.as_str()] {
            let result = AccountRegistry::register(&mut store, &blobs, draft(bad), None);
            assert!(matches!(result, Err(AgoraError::InvalidInput(_))), "{bad:?}");
        }
        let mut no_at = draft("ada");
        no_at.email = "ada.example.com".to_string();
        assert!(AccountRegistry::register(&mut store, &blobs, no_at, None).is_err());
    }

    #[test]
    fn register_duplicate_is_conflict_and_discards_upload() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs {
            accept: true,
            ..RecordingBlobs::default()
        };
        AccountRegistry::register(&mut store, &blobs, draft("ada"), None).expect("register");

        let result =
            AccountRegistry::register(&mut store, &blobs, draft("ADA"), Some(Path::new("p.png")));
        assert!(matches!(result, Err(AgoraError::Conflict(_))));
        assert_eq!(*blobs.deleted.borrow(), vec!["pic-1".to_string()]);
    }

    #[test]
    fn register_degrades_when_upload_fails() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let account =
            AccountRegistry::register(&mut store, &blobs, draft("ada"), Some(Path::new("p.png")))
                .expect("register");
        assert_eq!(account.profile_pic, None);
    }

    #[test]
    fn update_details_requires_a_field() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let ada = AccountRegistry::register(&mut store, &blobs, draft("ada"), None).expect("ok");

        let result = AccountRegistry::update_details(&mut store, ada.id, &AccountPatch::default());
        assert!(matches!(result, Err(AgoraError::InvalidInput(_))));
    }

    #[test]
    fn update_details_checks_uniqueness() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let ada = AccountRegistry::register(&mut store, &blobs, draft("ada"), None).expect("ok");
        AccountRegistry::register(&mut store, &blobs, draft("bob"), None).expect("ok");

        let taken = AccountPatch {
            username: Some("Bob".to_string()),
            ..AccountPatch::default()
        };
        assert!(matches!(
            AccountRegistry::update_details(&mut store, ada.id, &taken),
            Err(AgoraError::Conflict(_))
        ));

        let rename = AccountPatch {
            username: Some("lovelace".to_string()),
            bio: Some("  analyst ".to_string()),
            ..AccountPatch::default()
        };
        let updated = AccountRegistry::update_details(&mut store, ada.id, &rename).expect("update");
        assert_eq!(updated.username, "lovelace");
        assert_eq!(updated.bio, "analyst");
        assert!(
            store
                .find_account(AccountKey::Username("lovelace"))
                .expect("find")
                .is_some()
        );
    }

    #[test]
    fn update_profile_pic_replaces_and_deletes_old() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs {
            accept: true,
            ..RecordingBlobs::default()
        };
        let ada =
            AccountRegistry::register(&mut store, &blobs, draft("ada"), Some(Path::new("a.png")))
                .expect("register");
        assert_eq!(ada.profile_pic.as_deref(), Some("https://blobs.test/pic-1.png"));

        let updated =
            AccountRegistry::update_profile_pic(&mut store, &blobs, ada.id, Path::new("b.png"))
                .expect("update");
        assert_eq!(updated.profile_pic.as_deref(), Some("https://blobs.test/pic-2.png"));
        assert_eq!(*blobs.deleted.borrow(), vec!["pic-1".to_string()]);
    }

    #[test]
    fn update_profile_pic_upload_failure_is_dependency_failure() {
        let mut store = MemoryStore::new();
        let blobs = RecordingBlobs::default();
        let ada = AccountRegistry::register(&mut store, &blobs, draft("ada"), None).expect("ok");

        let result =
            AccountRegistry::update_profile_pic(&mut store, &blobs, ada.id, Path::new("b.png"));
        assert!(matches!(result, Err(AgoraError::DependencyFailure(_))));
    }

    #[test]
    fn unknown_account_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            AccountRegistry::account(&store, AccountId(42)),
            Err(AgoraError::NotFound(_))
        ));
    }

    #[test]
    fn uniqueness_conflict_is_not_retried() {
        let mut store = MemoryStore::new();
        let mut calls = 0;
        let result: Result<(), AgoraError> = with_retry(&mut store, "test", |_| {
            calls += 1;
            Err(AgoraError::Conflict("Username 'bob' is already taken".to_string()))
        });
        assert!(matches!(result, Err(AgoraError::Conflict(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn stale_revision_is_retried_then_reported_as_conflict() {
        let mut store = MemoryStore::new();
        let mut calls = 0;
        let result: Result<(), AgoraError> = with_retry(&mut store, "test", |_| {
            calls += 1;
            Err(AgoraError::StaleRevision("stale".to_string()))
        });
        assert!(matches!(result, Err(AgoraError::Conflict(_))));
        assert_eq!(calls, MAX_COMMIT_ATTEMPTS);
    }
}
