//! # Visibility Policy
//!
//! Decides whether a viewer may read a post.
//!
//! Public posts are readable by anyone, including anonymous viewers. Every
//! other tier is readable by its owner only: `Followers` is accepted and
//! stored but, at read time, is enforced exactly like `Private`.

use crate::{AccountId, AgoraError, Post, Visibility};

/// Whether `viewer` may read `post`. Never fails.
#[must_use]
pub fn can_view(viewer: Option<AccountId>, post: &Post) -> bool {
    match post.visibility {
        Visibility::Public => true,
        Visibility::Private | Visibility::Followers => viewer == Some(post.owner),
    }
}

/// `can_view` as a boundary check: `Forbidden` when the viewer may not read.
pub fn ensure_visible(viewer: Option<AccountId>, post: &Post) -> Result<(), AgoraError> {
    if can_view(viewer, post) {
        Ok(())
    } else {
        Err(AgoraError::Forbidden(format!(
            "You are not allowed to view post {}",
            post.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaType, PostId, Stamp};
    use std::collections::BTreeSet;

    fn post(owner: u64, visibility: Visibility) -> Post {
        Post {
            id: PostId(1),
            owner: AccountId(owner),
            title: "t".to_string(),
            description: String::new(),
            content: String::new(),
            media_type: MediaType::None,
            media_url: None,
            likes: BTreeSet::new(),
            tags: Vec::new(),
            visibility,
            revision: 1,
            created: Stamp(1),
            updated: Stamp(1),
        }
    }

    #[test]
    fn public_is_visible_to_everyone() {
        let p = post(1, Visibility::Public);
        assert!(can_view(None, &p));
        assert!(can_view(Some(AccountId(2)), &p));
    }

    #[test]
    fn private_is_owner_only() {
        let p = post(1, Visibility::Private);
        assert!(!can_view(None, &p));
        assert!(!can_view(Some(AccountId(2)), &p));
        assert!(can_view(Some(AccountId(1)), &p));
    }

    #[test]
    fn followers_tier_behaves_like_private() {
        let p = post(1, Visibility::Followers);
        assert!(!can_view(Some(AccountId(2)), &p));
        assert!(can_view(Some(AccountId(1)), &p));
    }

    #[test]
    fn ensure_visible_maps_to_forbidden() {
        let p = post(1, Visibility::Private);
        assert!(matches!(
            ensure_visible(None, &p),
            Err(AgoraError::Forbidden(_))
        ));
        assert!(ensure_visible(Some(AccountId(1)), &p).is_ok());
    }
}
