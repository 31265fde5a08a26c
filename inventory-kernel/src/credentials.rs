//! Upload des credentials châssis, une opération par ligne : `OP,ip,username,password`.
//!
//! `OP` vaut `ADD`, `UPDATE` ou `DELETE`. Les lignes vides sont ignorées ; une seule
//! ligne invalide rejette tout l'upload (rien n'est appliqué).

use crate::models::ChassisCredential;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("line {line}: expected 4 comma-separated fields, got {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: unknown operation '{op}'")]
    UnknownOperation { line: usize, op: String },
    #[error("line {line}: empty ip")]
    EmptyIp { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialAction {
    /// Ignoré si l'IP existe déjà
    Add,
    /// Ignoré si l'IP n'existe pas
    Update,
    Delete,
}

impl FromStr for CredentialAction {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(Self::Add),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialOp {
    pub action: CredentialAction,
    pub credential: ChassisCredential,
}

/// Bilan d'application d'un upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub ignored: usize,
}

pub fn parse_upload(text: &str) -> Result<Vec<CredentialOp>, CredentialError> {
    let mut ops = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        let [op, ip, username, password] = fields.as_slice() else {
            return Err(CredentialError::FieldCount { line, found: fields.len() });
        };

        let action = op
            .parse::<CredentialAction>()
            .map_err(|_| CredentialError::UnknownOperation { line, op: op.to_string() })?;
        if ip.is_empty() {
            return Err(CredentialError::EmptyIp { line });
        }

        ops.push(CredentialOp {
            action,
            credential: ChassisCredential {
                ip: ip.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
        });
    }

    Ok(ops)
}
