use serde::Deserialize;
use std::collections::BTreeMap;

/// A budget notification, as published by Cloud Billing to the budget's topic.
///
/// Only `budget_amount` and `cost_amount` take part in the decision to disable
/// billing. The remaining fields are carried through for notification text.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlertEvent {
    pub budget_amount: f64,
    pub cost_amount: f64,
    /// ISO currency code of both amounts. Empty if the event didn't include one.
    pub currency_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_interval_start: Option<String>,
    /// Fraction of the budget whose alert threshold was crossed, e.g. `0.9`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_threshold_exceeded: Option<f64>,
}

/// Reasons an inbound message could not be turned into a `BudgetAlertEvent`.
#[derive(Debug, thiserror::Error)]
pub enum MalformedEvent {
    #[error("event is not a valid JSON budget notification")]
    Json(#[source] serde_json::Error),
    #[error("event is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("event field `{field}` must be a finite, non-negative number (got {value})")]
    InvalidAmount { field: &'static str, value: f64 },
    #[error("push request is not a valid Pub/Sub envelope")]
    Envelope(#[source] serde_json::Error),
    #[error("Pub/Sub message has no data")]
    MissingData,
    #[error("Pub/Sub message data is not valid base64")]
    Base64(#[source] base64::DecodeError),
}

/// Parse and validate the body of a budget notification.
///
/// The body must be a JSON object. Only the amounts are required; display
/// fields of an unexpected type are dropped rather than failing the event.
pub fn parse_event(data: &[u8]) -> Result<BudgetAlertEvent, MalformedEvent> {
    let fields: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(data).map_err(MalformedEvent::Json)?;

    let budget_amount = amount(&fields, "budgetAmount")?;
    let cost_amount = amount(&fields, "costAmount")?;

    let text = |field: &str| {
        fields
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };

    Ok(BudgetAlertEvent {
        budget_amount,
        cost_amount,
        currency_code: text("currencyCode").unwrap_or_default(),
        budget_display_name: text("budgetDisplayName"),
        cost_interval_start: text("costIntervalStart"),
        alert_threshold_exceeded: fields
            .get("alertThresholdExceeded")
            .and_then(serde_json::Value::as_f64),
    })
}

fn amount(
    fields: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<f64, MalformedEvent> {
    let value = match fields.get(field) {
        None | Some(serde_json::Value::Null) => return Err(MalformedEvent::MissingField(field)),
        Some(value) => f64::deserialize(value).map_err(MalformedEvent::Json)?,
    };
    if !value.is_finite() || value < 0.0 {
        return Err(MalformedEvent::InvalidAmount { field, value });
    }
    Ok(value)
}

/// The body of a Pub/Sub push request.
/// See https://cloud.google.com/pubsub/docs/push#receive_push
#[derive(Debug, serde::Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64-encoded message payload.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

/// A message unwrapped from its push envelope.
#[derive(Debug)]
pub struct Delivery {
    pub message_id: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub data: Vec<u8>,
}

impl PushEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, MalformedEvent> {
        serde_json::from_slice(body).map_err(MalformedEvent::Envelope)
    }

    pub fn into_delivery(self) -> Result<Delivery, MalformedEvent> {
        let PushMessage {
            data,
            message_id,
            attributes,
            publish_time: _,
        } = self.message;

        let data = data.ok_or(MalformedEvent::MissingData)?;
        let data = base64::decode(data.trim()).map_err(MalformedEvent::Base64)?;

        Ok(Delivery {
            message_id,
            attributes,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_full_budget_notification() {
        let event = parse_event(
            br#"{
                "budgetDisplayName": "loo-cap",
                "alertThresholdExceeded": 0.9,
                "costAmount": 91.5,
                "costIntervalStart": "2024-05-01T07:00:00Z",
                "budgetAmount": 100,
                "budgetAmountType": "SPECIFIED_AMOUNT",
                "currencyCode": "USD"
            }"#,
        )
        .unwrap();

        assert_eq!(
            event,
            BudgetAlertEvent {
                budget_amount: 100.0,
                cost_amount: 91.5,
                currency_code: "USD".to_string(),
                budget_display_name: Some("loo-cap".to_string()),
                cost_interval_start: Some("2024-05-01T07:00:00Z".to_string()),
                alert_threshold_exceeded: Some(0.9),
            }
        );
    }

    #[test]
    fn test_currency_defaults_to_empty() {
        let event = parse_event(br#"{"budgetAmount": 10, "costAmount": 2.5}"#).unwrap();
        assert_eq!(event.currency_code, "");
        assert_eq!(event.budget_amount, 10.0);
        assert_eq!(event.cost_amount, 2.5);
        assert!(event.budget_display_name.is_none());
    }

    #[test]
    fn test_missing_amounts_are_rejected() {
        let err = parse_event(b"{}").unwrap_err();
        assert!(matches!(err, MalformedEvent::MissingField("budgetAmount")));

        let err = parse_event(br#"{"budgetAmount": 100}"#).unwrap_err();
        assert!(matches!(err, MalformedEvent::MissingField("costAmount")));

        let err = parse_event(br#"{"budgetAmount": 100, "costAmount": null}"#).unwrap_err();
        assert!(matches!(err, MalformedEvent::MissingField("costAmount")));
    }

    #[test]
    fn test_invalid_bodies_are_rejected() {
        let err = parse_event(br#"{"budgetAmount": -1, "costAmount": 5}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "event field `budgetAmount` must be a finite, non-negative number (got -1)"
        );

        let bodies: [&[u8]; 5] = [
            b"",
            b"not json",
            b"[]",
            br#"[100, 120, "USD", null, null, null]"#,
            br#"{"budgetAmount": "100", "costAmount": 5}"#,
        ];
        for body in bodies {
            let err = parse_event(body).unwrap_err();
            assert!(matches!(err, MalformedEvent::Json(_)), "{err:?}");
        }
    }

    #[test]
    fn test_mistyped_display_fields_are_dropped() {
        let event = parse_event(
            br#"{
                "budgetAmount": 100,
                "costAmount": 120,
                "currencyCode": 840,
                "budgetDisplayName": {"name": "loo-cap"},
                "costIntervalStart": 1714546800,
                "alertThresholdExceeded": "1.0"
            }"#,
        )
        .unwrap();

        assert_eq!(
            event,
            BudgetAlertEvent {
                budget_amount: 100.0,
                cost_amount: 120.0,
                currency_code: String::new(),
                budget_display_name: None,
                cost_interval_start: None,
                alert_threshold_exceeded: None,
            }
        );
    }

    #[test]
    fn test_push_envelope_is_unwrapped() {
        let data = base64::encode(br#"{"budgetAmount": 100, "costAmount": 42}"#);
        let body = serde_json::json!({
            "message": {
                "attributes": {"budgetId": "be8d7bfc", "schemaVersion": "1.0"},
                "data": data,
                "messageId": "2070443601311540",
                "message_id": "2070443601311540",
                "publishTime": "2024-05-01T12:00:00.000Z",
            },
            "subscription": "projects/loo/subscriptions/loo_cap_billing",
        });

        let delivery = PushEnvelope::parse(body.to_string().as_bytes())
            .unwrap()
            .into_delivery()
            .unwrap();

        assert_eq!(delivery.message_id.as_deref(), Some("2070443601311540"));
        assert_eq!(delivery.attributes["budgetId"], "be8d7bfc");

        let event = parse_event(&delivery.data).unwrap();
        assert_eq!(event.cost_amount, 42.0);
    }

    #[test]
    fn test_push_envelope_errors() {
        let err = PushEnvelope::parse(b"{}").unwrap_err();
        assert!(matches!(err, MalformedEvent::Envelope(_)));

        let err = PushEnvelope::parse(br#"{"message": {"messageId": "1"}}"#)
            .unwrap()
            .into_delivery()
            .unwrap_err();
        assert!(matches!(err, MalformedEvent::MissingData));

        let err = PushEnvelope::parse(br#"{"message": {"data": "!!not base64!!"}}"#)
            .unwrap()
            .into_delivery()
            .unwrap_err();
        assert!(matches!(err, MalformedEvent::Base64(_)));
    }
}
