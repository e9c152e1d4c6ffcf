//! Account profile edits
//!
//! The users service only takes single-field patches, so a profile edit is
//! sent as a sequence of them: name, then email, then phone number. The
//! sequence stops at the first rejected field.

use crate::api::UsersClient;
use crate::error::Result;
use crate::types::{FieldPatch, User};

/// Profile fields to change. `None` (or a blank value) leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl ProfileEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone_number.is_none()
    }

    /// One patch per field that is set and differs from `current`.
    pub fn patches(&self, current: &User) -> Vec<FieldPatch> {
        [
            ("name", &self.name, &current.name),
            ("email", &self.email, &current.email),
            ("phoneNumber", &self.phone_number, &current.phone_number),
        ]
        .into_iter()
        .filter_map(|(field, new, old)| {
            let new = new.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
            (new != old.trim()).then(|| FieldPatch::new(field, new))
        })
        .collect()
    }
}

/// Fetch the account, then save the fields `edit` changes.
///
/// Returns the names of the fields sent. On failure, fields before the
/// rejected one have already been saved.
pub async fn save_profile(
    users: &UsersClient,
    user_id: &str,
    edit: &ProfileEdit,
) -> Result<Vec<String>> {
    let current = users.get(user_id).await?;
    let patches = edit.patches(&current);
    users.update_fields(user_id, &patches).await?;
    Ok(patches.into_iter().map(|p| p.field_to_change).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pat() -> User {
        User {
            user_id: "u1".to_string(),
            name: "Pat Lee".to_string(),
            email: "pat@example.com".to_string(),
            phone_number: "555-0100".to_string(),
        }
    }

    #[test]
    fn test_patches_follow_form_order() {
        let edit = ProfileEdit {
            name: Some("Pat Kim".to_string()),
            email: Some("kim@example.com".to_string()),
            phone_number: Some("555-0199".to_string()),
        };
        let fields: Vec<_> = edit
            .patches(&pat())
            .into_iter()
            .map(|p| (p.field_to_change, p.new_value))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("name".to_string(), json!("Pat Kim")),
                ("email".to_string(), json!("kim@example.com")),
                ("phoneNumber".to_string(), json!("555-0199")),
            ]
        );
    }

    #[test]
    fn test_unchanged_and_blank_fields_are_skipped() {
        let edit = ProfileEdit {
            name: Some(" Pat Lee ".to_string()),
            email: Some("   ".to_string()),
            phone_number: Some("555-0142".to_string()),
        };
        let patches = edit.patches(&pat());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].field_to_change, "phoneNumber");
        assert!(patches[0].user_id.is_none());
    }

    #[test]
    fn test_empty_edit() {
        assert!(ProfileEdit::default().is_empty());
        assert!(ProfileEdit::default().patches(&pat()).is_empty());
    }
}
