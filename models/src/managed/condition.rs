use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The condition types every managed resource reports.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
pub enum ConditionType {
    /// Whether the external object is ready for use.
    Ready,
    /// Whether the last reconcile of the managed resource succeeded.
    Synced,
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
pub enum ConditionReason {
    Available,
    Unavailable,
    Creating,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
}

/// A single observation of one aspect of a managed resource.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    /// RFC 3339 time at which `status` last changed.
    pub last_transition_time: String,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: ConditionReason,
        message: Option<String>,
    ) -> Self {
        Condition {
            condition_type,
            status,
            last_transition_time: Utc::now().to_rfc3339(),
            reason,
            message,
        }
    }

    /// The external object is ready for use.
    pub fn available() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::True,
            ConditionReason::Available,
            None,
        )
    }

    /// The external object exists but is not ready for use.
    pub fn unavailable() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            ConditionReason::Unavailable,
            None,
        )
    }

    pub fn creating() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            ConditionReason::Creating,
            None,
        )
    }

    pub fn deleting() -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            ConditionReason::Deleting,
            None,
        )
    }

    pub fn reconcile_success() -> Self {
        Self::new(
            ConditionType::Synced,
            ConditionStatus::True,
            ConditionReason::ReconcileSuccess,
            None,
        )
    }

    pub fn reconcile_error<S: Into<String>>(message: S) -> Self {
        Self::new(
            ConditionType::Synced,
            ConditionStatus::False,
            ConditionReason::ReconcileError,
            Some(message.into()),
        )
    }

    /// Conditions are equivalent when everything but the transition time matches.
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// The conditions portion of a managed resource's status.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub struct ConditionedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ConditionedStatus {
    /// Sets a condition, replacing any existing condition of the same type. An equivalent
    /// existing condition is left untouched so its transition time is preserved.
    pub fn set_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) if existing.equivalent(&condition) => {}
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_replaces_by_type() {
        let mut status = ConditionedStatus::default();
        status.set_condition(Condition::creating());
        status.set_condition(Condition::reconcile_success());
        status.set_condition(Condition::available());

        assert_eq!(status.conditions.len(), 2);
        assert_eq!(status.conditions[0].reason, ConditionReason::Available);
        assert_eq!(status.conditions[1].reason, ConditionReason::ReconcileSuccess);
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_equivalent() {
        let mut first = Condition::available();
        first.last_transition_time = "2020-01-01T00:00:00+00:00".to_string();

        let mut status = ConditionedStatus {
            conditions: vec![first.clone()],
        };
        status.set_condition(Condition::available());

        assert_eq!(status.conditions, vec![first]);
    }

    #[test]
    fn test_condition_serializes_with_kubernetes_field_names() {
        let value = serde_json::to_value(Condition::reconcile_error("boom")).unwrap();
        assert_eq!(value["type"], "Synced");
        assert_eq!(value["status"], "False");
        assert_eq!(value["reason"], "ReconcileError");
        assert_eq!(value["message"], "boom");
        assert!(value["lastTransitionTime"].is_string());
    }
}
