//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::monitor::UNASSIGNED_BUCKET;

/// Longest identifier accepted for nodes, tasks and players.
const MAX_ID_LEN: usize = 64;

/// Validates that a node ID is a short printable identifier and not the reserved bucket name.
///
/// # Examples
///
/// ```ignore
/// validate_node_id("node1")      // Ok
/// validate_node_id("")           // Err - empty
/// validate_node_id("unassigned") // Err - reserved
/// ```
pub fn validate_node_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier(id, "node_id")?;

    if id == UNASSIGNED_BUCKET {
        let mut err = ValidationError::new("node_id_reserved");
        err.message = Some(format!("Node ID `{UNASSIGNED_BUCKET}` is reserved").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a task ID.
pub fn validate_task_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier(id, "task_id")
}

/// Validates a player ID.
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier(id, "player_id")
}

fn validate_identifier(id: &str, field: &'static str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        let mut err = ValidationError::new("id_length");
        err.message = Some(
            format!(
                "{field} must be between 1 and {MAX_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        let mut err = ValidationError::new("id_format");
        err.message = Some(format!("{field} must not contain whitespace or control characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_node_id_valid() {
        assert!(validate_node_id("node1").is_ok());
        assert!(validate_node_id("worker-10.eu").is_ok());
    }

    #[test]
    fn test_validate_node_id_invalid() {
        assert!(validate_node_id("").is_err());
        assert!(validate_node_id("unassigned").is_err());
        assert!(validate_node_id("node 1").is_err());
        assert!(validate_node_id(&"n".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_player_id() {
        assert!(validate_player_id("p1").is_ok());
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id("p\n1").is_err());
    }
}
