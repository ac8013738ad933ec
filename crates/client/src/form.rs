//! Form view models: a single record form and a multi-row line-item form.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use keel_core::field::parse_decimal;
use keel_core::{FieldDef, FieldError, FieldKind, ValidationMode, validate_fields};

use crate::error::ClientError;
use crate::mutation::Mutation;
use crate::notify::{Notifier, Toast};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    Submitting,
    Success,
    Error,
}

/// Editable text values for one record, keyed by field name.
#[derive(Debug, Clone)]
pub struct FormState {
    fields: &'static [FieldDef],
    mode: ValidationMode,
    initial: BTreeMap<&'static str, String>,
    values: BTreeMap<&'static str, String>,
    errors: Vec<FieldError>,
    phase: FormPhase,
    success_message: String,
}

impl FormState {
    /// Empty form for creating a record.
    pub fn new(fields: &'static [FieldDef]) -> Self {
        let initial = fields.iter().map(|f| (f.name, String::new())).collect::<BTreeMap<_, _>>();
        Self {
            fields,
            mode: ValidationMode::Create,
            values: initial.clone(),
            initial,
            errors: Vec::new(),
            phase: FormPhase::Editing,
            success_message: "Saved".to_string(),
        }
    }

    /// Form prefilled from a record's JSON, submitting as a partial update.
    pub fn for_record(fields: &'static [FieldDef], record: &Value) -> Self {
        let mut form = Self::new(fields);
        form.mode = ValidationMode::Patch;
        for def in fields {
            if let Some(raw) = record.get(def.name) {
                form.initial.insert(def.name, display_value(raw));
            }
        }
        form.values = form.initial.clone();
        form
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or_default()
    }

    /// Update one field from user input. Unknown field names are ignored.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let Some(def) = self.fields.iter().find(|f| f.name == field) else {
            tracing::debug!(field, "ignoring input for unknown form field");
            return false;
        };
        self.values.insert(def.name, value.into());
        self.errors.retain(|e| e.field != field);
        if self.phase != FormPhase::Submitting {
            self.phase = FormPhase::Editing;
        }
        true
    }

    /// True when every field is blank.
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }

    pub fn is_dirty(&self) -> bool {
        self.values != self.initial
    }

    /// Check required fields and parse values into the JSON payload that
    /// would be submitted.
    pub fn validate(&self) -> Result<Map<String, Value>, Vec<FieldError>> {
        let raw = self
            .values
            .iter()
            .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
            .collect::<Map<_, _>>();
        validate_fields(self.fields, &Value::Object(raw), self.mode)
    }

    /// Back to the initial values.
    pub fn reset(&mut self) {
        self.values = self.initial.clone();
        self.errors.clear();
        self.phase = FormPhase::Editing;
    }

    /// Validate and send through `mutation`.
    ///
    /// Invalid input sends nothing. On success the form resets, and an edit
    /// form takes the saved record as its new baseline. On failure the
    /// entered values are kept so the user can correct and retry.
    pub async fn submit(&mut self, mutation: &Mutation, notifier: &dyn Notifier) -> Result<Value, ClientError> {
        let payload = match self.validate() {
            Ok(payload) => payload,
            Err(errors) => {
                let err = ClientError::Validation(errors.clone());
                self.errors = errors;
                self.phase = FormPhase::Error;
                notifier.notify(Toast::error(err.user_message()));
                return Err(err);
            }
        };

        self.errors.clear();
        self.phase = FormPhase::Submitting;
        match mutation.mutate(Value::Object(payload)).await {
            Ok(body) => {
                if self.mode == ValidationMode::Patch {
                    self.initial = self.values.clone();
                    for def in self.fields {
                        if let Some(saved) = body.get(def.name) {
                            self.initial.insert(def.name, display_value(saved));
                        }
                    }
                }
                self.reset();
                self.phase = FormPhase::Success;
                notifier.notify(Toast::success(self.success_message.clone()));
                Ok(body)
            }
            Err(e) => {
                self.phase = FormPhase::Error;
                notifier.notify(Toast::error(e.user_message()));
                Err(e)
            }
        }
    }
}

/// Text shown in an input for a stored value.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Several rows of the same record type entered and saved together,
/// with a running total of one numeric field.
#[derive(Debug, Clone)]
pub struct LineItemsForm {
    fields: &'static [FieldDef],
    amount_field: &'static str,
    rows: Vec<FormState>,
}

impl LineItemsForm {
    /// Starts with one empty row.
    pub fn new(fields: &'static [FieldDef], amount_field: &'static str) -> Self {
        debug_assert!(
            fields
                .iter()
                .any(|f| f.name == amount_field && f.kind == FieldKind::Number),
            "amount field must be a numeric field"
        );
        Self {
            fields,
            amount_field,
            rows: vec![FormState::new(fields)],
        }
    }

    pub fn rows(&self) -> &[FormState] {
        &self.rows
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut FormState> {
        self.rows.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(FormState::is_blank)
    }

    /// Append an empty row and return its index.
    pub fn add_row(&mut self) -> usize {
        self.rows.push(FormState::new(self.fields));
        self.rows.len() - 1
    }

    /// Remove a row. Removing the only row leaves one empty row behind.
    pub fn remove_row(&mut self, index: usize) -> bool {
        if index >= self.rows.len() {
            return false;
        }
        self.rows.remove(index);
        if self.rows.is_empty() {
            self.rows.push(FormState::new(self.fields));
        }
        true
    }

    /// Sum of the amount column. Unparseable amounts count as zero.
    pub fn total(&self) -> f64 {
        self.rows
            .iter()
            .filter_map(|row| parse_decimal(row.value(self.amount_field)))
            .sum()
    }

    pub fn formatted_total(&self) -> String {
        format_currency(self.total())
    }

    /// Post every non-blank row through `mutation`, in order.
    ///
    /// All rows are validated first; any invalid row stops the submit before
    /// a request is sent. With every row blank the first row is validated,
    /// so an empty form reports its required fields instead of saving
    /// nothing. If a request fails, rows already saved are dropped and the
    /// rest stay for a retry.
    pub async fn submit(&mut self, mutation: &Mutation, notifier: &dyn Notifier) -> Result<usize, ClientError> {
        let all_blank = self.is_empty();
        let mut pending = Vec::new();
        let mut errors = Vec::new();
        for (index, row) in self.rows.iter_mut().enumerate() {
            if row.is_blank() && !(all_blank && index == 0) {
                continue;
            }
            match row.validate() {
                Ok(payload) => pending.push((index, payload)),
                Err(row_errors) => {
                    row.errors = row_errors.clone();
                    row.phase = FormPhase::Error;
                    errors.extend(row_errors);
                }
            }
        }

        if !errors.is_empty() {
            let err = ClientError::Validation(errors);
            notifier.notify(Toast::error(err.user_message()));
            return Err(err);
        }

        let mut saved = Vec::with_capacity(pending.len());
        for (index, payload) in pending {
            self.rows[index].phase = FormPhase::Submitting;
            match mutation.mutate(Value::Object(payload)).await {
                Ok(_) => saved.push(index),
                Err(e) => {
                    self.rows[index].phase = FormPhase::Error;
                    self.drop_rows(&saved);
                    tracing::warn!(saved = saved.len(), error = %e, "line items partially saved");
                    notifier.notify(Toast::error(e.user_message()));
                    return Err(e);
                }
            }
        }

        let count = saved.len();
        self.rows = vec![FormState::new(self.fields)];
        let noun = if count == 1 { "line" } else { "lines" };
        notifier.notify(Toast::success(format!("Saved {count} {noun}")));
        Ok(count)
    }

    fn drop_rows(&mut self, indices: &[usize]) {
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        if self.rows.is_empty() {
            self.rows.push(FormState::new(self.fields));
        }
    }
}

/// `1234.5` → `"$1,234.50"`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use keel_core::Catalog;
    use serde_json::json;

    use crate::cache::{CacheConfig, QueryCache};
    use crate::notify::{ToastLevel, ToastQueue};
    use crate::query::Method;
    use crate::testing::MockTransport;

    fn expense_fields() -> &'static [FieldDef] {
        Catalog::standard().find("expenses", "lines").unwrap().fields
    }

    fn echo() -> Arc<MockTransport> {
        Arc::new(MockTransport::new(|req, _| Ok(req.body.clone().unwrap_or(Value::Null))))
    }

    fn post(transport: &Arc<MockTransport>) -> Mutation {
        let cache = QueryCache::new(transport.clone(), CacheConfig::default());
        Mutation::new(&cache, Method::Post, "/api/expenses/lines")
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(125.5), "$125.50");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.0), "-$42.00");
    }

    #[test]
    fn set_ignores_unknown_fields() {
        let mut form = FormState::new(expense_fields());
        assert!(form.set("amount", "12"));
        assert!(!form.set("status", "Approved"));
        assert_eq!(form.value("amount"), "12");
        assert_eq!(form.value("status"), "");
        assert!(form.is_dirty());
    }

    #[test]
    fn validate_parses_numbers_and_skips_blanks() {
        let mut form = FormState::new(expense_fields());
        form.set("description", "Taxi");
        form.set("amount", "$1,250.75");
        let payload = form.validate().unwrap();
        assert_eq!(payload["amount"], json!(1250.75));
        assert!(!payload.contains_key("project"));
    }

    #[tokio::test]
    async fn missing_required_field_sends_nothing() {
        let transport = echo();
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut form = FormState::new(expense_fields());
        form.set("amount", "10");

        let err = form.submit(&mutation, &toasts).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(transport.count(), 0);
        assert_eq!(form.phase(), FormPhase::Error);
        assert!(form.error_for("description").is_some());
        assert_eq!(form.value("amount"), "10");
        assert_eq!(toasts.latest().unwrap().level, ToastLevel::Error);
    }

    #[tokio::test]
    async fn successful_submit_resets_the_form() {
        let transport = echo();
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut form = FormState::new(expense_fields()).with_success_message("Expense saved");
        form.set("description", "Hotel");
        form.set("amount", "200");

        form.submit(&mutation, &toasts).await.unwrap();
        assert_eq!(form.phase(), FormPhase::Success);
        assert_eq!(form.value("description"), "");
        assert!(!form.is_dirty());
        assert_eq!(toasts.latest(), Some(Toast::success("Expense saved")));
    }

    #[tokio::test]
    async fn failed_submit_keeps_values() {
        let transport = Arc::new(MockTransport::new(|_, _| {
            Err(ClientError::Http { status: 500, code: "store_error".into(), message: "disk full".into() })
        }));
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut form = FormState::new(expense_fields());
        form.set("description", "Hotel");
        form.set("amount", "200");

        form.submit(&mutation, &toasts).await.unwrap_err();
        assert_eq!(form.phase(), FormPhase::Error);
        assert_eq!(form.value("description"), "Hotel");
        assert_eq!(toasts.latest(), Some(Toast::error("disk full")));
    }

    #[test]
    fn edit_form_is_prefilled_and_clears_to_null() {
        let record = json!({ "id": "1", "description": "Taxi", "amount": 12.5, "project": "Apollo" });
        let mut form = FormState::for_record(expense_fields(), &record);
        assert_eq!(form.value("amount"), "12.5");
        assert!(!form.is_dirty());

        form.set("project", "");
        let payload = form.validate().unwrap();
        assert_eq!(payload["project"], Value::Null);
        assert_eq!(payload["description"], json!("Taxi"));
    }

    #[tokio::test]
    async fn saved_edit_becomes_the_new_baseline() {
        let transport = Arc::new(MockTransport::new(|req, _| {
            let mut saved = json!({ "id": "1", "description": "Taxi", "amount": 12.5, "project": "Apollo" });
            if let Some(Value::Object(patch)) = &req.body {
                for (k, v) in patch {
                    saved[k.as_str()] = v.clone();
                }
            }
            Ok(saved)
        }));
        let cache = QueryCache::new(transport.clone(), CacheConfig::default());
        let mutation = Mutation::new(&cache, Method::Patch, "/api/expenses/lines/1");
        let toasts = ToastQueue::new();
        let record = json!({ "id": "1", "description": "Taxi", "amount": 12.5, "project": "Apollo" });
        let mut form = FormState::for_record(expense_fields(), &record);

        form.set("amount", "20.5");
        form.submit(&mutation, &toasts).await.unwrap();
        assert_eq!(form.phase(), FormPhase::Success);
        assert_eq!(form.value("amount"), "20.5");
        assert_eq!(form.value("description"), "Taxi");
        assert!(!form.is_dirty());

        form.set("amount", "30");
        form.reset();
        assert_eq!(form.value("amount"), "20.5");
    }

    #[test]
    fn line_items_start_with_one_row_and_total_amounts() {
        let mut lines = LineItemsForm::new(expense_fields(), "amount");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.formatted_total(), "$0.00");

        lines.row_mut(0).unwrap().set("amount", "125.50");
        let second = lines.add_row();
        lines.row_mut(second).unwrap().set("amount", "1,000");
        assert_eq!(lines.formatted_total(), "$1,125.50");

        assert!(lines.remove_row(0));
        assert!(lines.remove_row(0));
        assert_eq!(lines.len(), 1);
        assert!(!lines.remove_row(3));
    }

    #[tokio::test]
    async fn line_items_submit_each_row_then_reset() {
        let transport = echo();
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut lines = LineItemsForm::new(expense_fields(), "amount");
        {
            let row = lines.row_mut(0).unwrap();
            row.set("description", "Lunch");
            row.set("amount", "125.50");
        }
        assert_eq!(lines.formatted_total(), "$125.50");
        lines.add_row();

        assert_eq!(lines.submit(&mutation, &toasts).await.unwrap(), 1);
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body.as_ref().unwrap()["amount"], json!(125.5));

        assert_eq!(lines.len(), 1);
        assert!(lines.is_empty());
        assert_eq!(toasts.latest(), Some(Toast::success("Saved 1 line")));
    }

    #[tokio::test]
    async fn line_items_keep_unsaved_rows_on_failure() {
        let transport = Arc::new(MockTransport::new(|req, n| {
            if n == 0 { Ok(req.body.clone().unwrap_or_default()) } else { Err(ClientError::Network("offline".into())) }
        }));
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut lines = LineItemsForm::new(expense_fields(), "amount");
        for (i, desc) in ["Taxi", "Hotel", "Dinner"].into_iter().enumerate() {
            if i > 0 {
                lines.add_row();
            }
            let row = lines.row_mut(i).unwrap();
            row.set("description", desc);
            row.set("amount", "10");
        }

        lines.submit(&mutation, &toasts).await.unwrap_err();
        assert_eq!(transport.count(), 2);
        let left = lines.rows().iter().map(|r| r.value("description")).collect::<Vec<_>>();
        assert_eq!(left, vec!["Hotel", "Dinner"]);
        assert_eq!(lines.rows()[0].phase(), FormPhase::Error);
        assert_eq!(toasts.latest().unwrap().level, ToastLevel::Error);
    }

    #[tokio::test]
    async fn invalid_line_blocks_every_request() {
        let transport = echo();
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut lines = LineItemsForm::new(expense_fields(), "amount");
        lines.row_mut(0).unwrap().set("description", "Taxi");
        lines.row_mut(0).unwrap().set("amount", "10");
        let second = lines.add_row();
        lines.row_mut(second).unwrap().set("amount", "5");

        assert!(matches!(
            lines.submit(&mutation, &toasts).await,
            Err(ClientError::Validation(_))
        ));
        assert_eq!(transport.count(), 0);
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn all_blank_rows_are_a_validation_error() {
        let transport = echo();
        let mutation = post(&transport);
        let toasts = ToastQueue::new();
        let mut lines = LineItemsForm::new(expense_fields(), "amount");
        lines.add_row();
        lines.add_row();

        let err = lines.submit(&mutation, &toasts).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(transport.count(), 0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.rows()[0].phase(), FormPhase::Error);
        assert!(lines.rows()[0].error_for("description").is_some());
        assert_eq!(lines.rows()[1].phase(), FormPhase::Editing);
        assert_eq!(toasts.latest().unwrap().level, ToastLevel::Error);
        assert_ne!(toasts.latest(), Some(Toast::success("Saved 0 lines")));
    }
}
