//! Permission records
//!
//! Each protected resource exclusively owns its permission rows (1:1). A
//! permission grants access to the world, to named users (crsids), or to
//! members of lookup groups and institutions.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use std::collections::BTreeSet;

use crate::lookup::Memberships;
use crate::principal::Principal;
use crate::token::make_token;
use crate::{Error, Result};

/// A set of principals granted a capability over one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub is_public: bool,
    pub crsids: BTreeSet<String>,
    pub group_ids: BTreeSet<String>,
    pub inst_ids: BTreeSet<String>,
}

impl Permission {
    /// A new permission in the reset state with a fresh id
    pub fn new() -> Self {
        Self {
            id: make_token(),
            ..Default::default()
        }
    }

    /// A new public permission with a fresh id
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::new()
        }
    }

    /// Clear the public flag and every identifier set
    pub fn reset(&mut self) {
        self.is_public = false;
        self.crsids.clear();
        self.group_ids.clear();
        self.inst_ids.clear();
    }

    /// True if nobody is granted anything
    pub fn is_reset(&self) -> bool {
        !self.is_public
            && self.crsids.is_empty()
            && self.group_ids.is_empty()
            && self.inst_ids.is_empty()
    }

    /// Does this permission grant access to the principal?
    ///
    /// Identifiers are compared exactly; no case folding.
    pub fn grants(&self, principal: &Principal, memberships: &Memberships) -> bool {
        if self.is_public {
            return true;
        }

        if let Some(crsid) = principal.crsid() {
            if self.crsids.contains(crsid) {
                return true;
            }
        }

        if !self.group_ids.is_disjoint(&memberships.group_ids) {
            return true;
        }

        !self.inst_ids.is_disjoint(&memberships.inst_ids)
    }
}

fn encode_ids(ids: &BTreeSet<String>) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

fn decode_ids(raw: &str) -> Result<BTreeSet<String>> {
    Ok(serde_json::from_str(raw)?)
}

/// Build a permission from columns with the given prefix
///
/// Catalogue queries join several permissions into one row, so columns are
/// aliased `<prefix>id`, `<prefix>is_public`, ...
pub(crate) fn permission_from_row(row: &SqliteRow, prefix: &str) -> Result<Permission> {
    let col = |name: &str| format!("{}{}", prefix, name);

    let crsids: String = row.try_get(col("crsids").as_str())?;
    let group_ids: String = row.try_get(col("group_ids").as_str())?;
    let inst_ids: String = row.try_get(col("inst_ids").as_str())?;

    Ok(Permission {
        id: row.try_get(col("id").as_str())?,
        is_public: row.try_get(col("is_public").as_str())?,
        crsids: decode_ids(&crsids)?,
        group_ids: decode_ids(&group_ids)?,
        inst_ids: decode_ids(&inst_ids)?,
    })
}

/// Insert a new permission row
pub async fn insert_permission<'e, E>(executor: E, permission: &Permission) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO permissions (id, is_public, crsids, group_ids, inst_ids, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&permission.id)
    .bind(permission.is_public)
    .bind(encode_ids(&permission.crsids)?)
    .bind(encode_ids(&permission.group_ids)?)
    .bind(encode_ids(&permission.inst_ids)?)
    .bind(chrono::Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Load a permission by id
pub async fn load_permission<'e, E>(executor: E, id: &str) -> Result<Permission>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, is_public, crsids, group_ids, inst_ids FROM permissions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| Error::NotFound(format!("permission {}", id)))?;

    permission_from_row(&row, "")
}

/// Persist every field of a permission in one single-row update
pub async fn save_permission<'e, E>(executor: E, permission: &Permission) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE permissions
        SET is_public = ?, crsids = ?, group_ids = ?, inst_ids = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(permission.is_public)
    .bind(encode_ids(&permission.crsids)?)
    .bind(encode_ids(&permission.group_ids)?)
    .bind(encode_ids(&permission.inst_ids)?)
    .bind(chrono::Utc::now())
    .bind(&permission.id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("permission {}", permission.id)));
    }

    Ok(())
}

/// Reset a stored permission
///
/// The flag and all three identifier sets are cleared by one UPDATE, so no
/// partially reset state is ever visible to readers.
pub async fn reset_permission<'e, E>(executor: E, id: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE permissions
        SET is_public = 0, crsids = '[]', group_ids = '[]', inst_ids = '[]', updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("permission {}", id)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> Permission {
        Permission {
            id: "perm1".to_string(),
            is_public: true,
            crsids: ["spqr1".to_string()].into(),
            group_ids: ["101888".to_string()].into(),
            inst_ids: ["ENG".to_string()].into(),
        }
    }

    #[test]
    fn test_new_permission_is_reset() {
        let p = Permission::new();
        assert!(p.is_reset());
        assert_eq!(p.id.len(), crate::token::TOKEN_LEN);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut p = populated();
        assert!(!p.is_reset());
        p.reset();
        assert!(!p.is_public);
        assert!(p.crsids.is_empty());
        assert!(p.group_ids.is_empty());
        assert!(p.inst_ids.is_empty());
        assert_eq!(p.id, "perm1", "reset keeps identity");
    }

    #[test]
    fn test_public_grants_anonymous() {
        let p = Permission::public();
        assert!(p.grants(&Principal::Anonymous, &Memberships::default()));
    }

    #[test]
    fn test_crsid_grant_is_exact() {
        let mut p = Permission::new();
        p.crsids.insert("spqr1".to_string());

        let none = Memberships::default();
        assert!(p.grants(&Principal::user("spqr1"), &none));
        assert!(!p.grants(&Principal::user("SPQR1"), &none));
        assert!(!p.grants(&Principal::user("spqr"), &none));
        assert!(!p.grants(&Principal::Anonymous, &none));
    }

    #[test]
    fn test_group_and_institution_grants() {
        let mut p = Permission::new();
        p.group_ids.insert("101888".to_string());
        p.inst_ids.insert("ENG".to_string());

        let user = Principal::user("abc12");
        assert!(p.grants(&user, &Memberships::new(["101888"], Vec::<String>::new())));
        assert!(p.grants(&user, &Memberships::new(Vec::<String>::new(), ["ENG"])));
        assert!(!p.grants(&user, &Memberships::new(["999"], ["CHEM"])));
        assert!(!p.grants(&user, &Memberships::default()));
    }

    #[test]
    fn test_id_sets_round_trip_through_json_columns() {
        let p = populated();
        let encoded = encode_ids(&p.crsids).unwrap();
        assert_eq!(encoded, r#"["spqr1"]"#);
        assert_eq!(decode_ids(&encoded).unwrap(), p.crsids);
        assert!(decode_ids("[]").unwrap().is_empty());
    }
}
