//! Resource catalog: which record types exist, their fields, and the status
//! actions each one supports.

use serde::Serialize;

use crate::error::{DomainError, DomainResult};
use crate::field::{FieldDef, FieldKind};

/// One status action, e.g. `approve: Submitted -> Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub action: &'static str,
    pub from: &'static [&'static str],
    pub to: &'static str,
}

/// Status enum of a resource and the actions that move between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    pub initial: &'static str,
    pub transitions: &'static [Transition],
}

impl Lifecycle {
    pub fn transition(&self, action: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.action == action)
    }

    /// Resolve the target status of `action` taken from `current`.
    ///
    /// Repeating an action on a record that already sits in the action's
    /// target status succeeds and leaves it there.
    pub fn apply(&self, current: Option<&str>, action: &str) -> DomainResult<&'static str> {
        let t = self.transition(action).ok_or(DomainError::NotFound)?;
        let current = current.unwrap_or(self.initial);

        if current == t.to || t.from.contains(&current) {
            Ok(t.to)
        } else {
            Err(DomainError::invalid_transition(format!(
                "cannot {action} a record in status {current}"
            )))
        }
    }
}

/// A resource exposed under `/api/<module>/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceDef {
    pub module: &'static str,
    pub name: &'static str,
    pub label: &'static str,
    pub fields: &'static [FieldDef],
    pub lifecycle: Option<Lifecycle>,
}

impl ResourceDef {
    /// Catalog key, `module/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }

    pub fn collection_path(&self) -> String {
        format!("/api/{}/{}", self.module, self.name)
    }

    pub fn item_path(&self, id: impl core::fmt::Display) -> String {
        format!("{}/{}", self.collection_path(), id)
    }

    pub fn action_path(&self, id: impl core::fmt::Display, action: &str) -> String {
        format!("{}/{}", self.item_path(id), action)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn initial_status(&self) -> Option<&'static str> {
        self.lifecycle.map(|l| l.initial)
    }
}

/// The set of resources served by one deployment.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    resources: Vec<ResourceDef>,
}

impl Catalog {
    pub fn new(resources: Vec<ResourceDef>) -> Self {
        Self { resources }
    }

    /// Every resource the ERP modules ship with.
    pub fn standard() -> Self {
        Self::new(STANDARD.to_vec())
    }

    pub fn find(&self, module: &str, name: &str) -> Option<&ResourceDef> {
        self.resources
            .iter()
            .find(|r| r.module == module && r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDef> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standard resources
// ─────────────────────────────────────────────────────────────────────────────

const APPROVAL_FLOW: &[Transition] = &[
    Transition { action: "submit", from: &["Draft"], to: "Submitted" },
    Transition { action: "approve", from: &["Submitted"], to: "Approved" },
    Transition { action: "reject", from: &["Submitted"], to: "Rejected" },
    Transition { action: "reopen", from: &["Rejected"], to: "Draft" },
];

const ACTIVATION: &[Transition] = &[
    Transition { action: "deactivate", from: &["Active"], to: "Inactive" },
    Transition { action: "activate", from: &["Inactive"], to: "Active" },
];

const EXPENSE_CATEGORIES: &[&str] = &["travel", "meals", "lodging", "supplies", "other"];
const MATCH_STATES: &[&str] = &["unmatched", "two_way", "three_way"];
const BILLING_FREQUENCIES: &[&str] = &["monthly", "quarterly", "annually", "milestone"];
const BILLING_METHODS: &[&str] = &["advance", "arrears"];
const RISK_CATEGORIES: &[&str] = &["operational", "financial", "compliance", "strategic"];
const RISK_LEVELS: &[&str] = &["low", "medium", "high"];
const PICK_METHODS: &[&str] = &["fifo", "fefo", "lifo"];
const LEAD_SOURCES: &[&str] = &["web", "referral", "event", "outbound"];

const STANDARD: &[ResourceDef] = &[
    ResourceDef {
        module: "expenses",
        name: "lines",
        label: "Expense lines",
        fields: &[
            FieldDef::required("description", "Description", FieldKind::Text),
            FieldDef::optional("category", "Category", FieldKind::Enum(EXPENSE_CATEGORIES)),
            FieldDef::required("amount", "Amount", FieldKind::Number),
            FieldDef::optional("incurred_on", "Date", FieldKind::Date),
            FieldDef::optional("project", "Project", FieldKind::Text),
        ],
        lifecycle: Some(Lifecycle { initial: "Draft", transitions: APPROVAL_FLOW }),
    },
    ResourceDef {
        module: "ap",
        name: "invoices",
        label: "Supplier invoices",
        fields: &[
            FieldDef::required("vendor", "Vendor", FieldKind::Text),
            FieldDef::required("invoice_number", "Invoice #", FieldKind::Text),
            FieldDef::required("amount", "Amount", FieldKind::Number),
            FieldDef::optional("invoice_date", "Invoice date", FieldKind::Date),
            FieldDef::optional("due_date", "Due date", FieldKind::Date),
            FieldDef::optional("purchase_order", "PO #", FieldKind::Text),
            FieldDef::optional("match_status", "3-way match", FieldKind::Enum(MATCH_STATES)),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Draft",
            transitions: &[
                Transition { action: "submit", from: &["Draft"], to: "Submitted" },
                Transition { action: "approve", from: &["Submitted"], to: "Approved" },
                Transition { action: "reject", from: &["Submitted"], to: "Rejected" },
                Transition { action: "pay", from: &["Approved"], to: "Paid" },
            ],
        }),
    },
    ResourceDef {
        module: "procurement",
        name: "purchase-orders",
        label: "Purchase orders",
        fields: &[
            FieldDef::required("supplier", "Supplier", FieldKind::Text),
            FieldDef::required("order_number", "PO #", FieldKind::Text),
            FieldDef::required("total", "Total", FieldKind::Number),
            FieldDef::optional("currency", "Currency", FieldKind::Text),
            FieldDef::optional("expected_on", "Expected", FieldKind::Date),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Draft",
            transitions: &[
                Transition { action: "submit", from: &["Draft"], to: "Submitted" },
                Transition { action: "approve", from: &["Submitted"], to: "Approved" },
                Transition { action: "reject", from: &["Submitted"], to: "Rejected" },
                Transition { action: "close", from: &["Approved"], to: "Closed" },
            ],
        }),
    },
    ResourceDef {
        module: "inventory",
        name: "shipments",
        label: "Shipments",
        fields: &[
            FieldDef::required("reference", "Reference", FieldKind::Text),
            FieldDef::required("carrier", "Carrier", FieldKind::Text),
            FieldDef::optional("origin", "Origin", FieldKind::Text),
            FieldDef::required("destination", "Destination", FieldKind::Text),
            FieldDef::optional("ship_date", "Ship date", FieldKind::Date),
            FieldDef::optional("weight_kg", "Weight (kg)", FieldKind::Number),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Pending",
            transitions: &[
                Transition { action: "dispatch", from: &["Pending"], to: "InTransit" },
                Transition { action: "deliver", from: &["InTransit"], to: "Delivered" },
                Transition { action: "cancel", from: &["Pending"], to: "Cancelled" },
            ],
        }),
    },
    ResourceDef {
        module: "manufacturing",
        name: "work-orders",
        label: "Work orders",
        fields: &[
            FieldDef::required("product", "Product", FieldKind::Text),
            FieldDef::required("quantity", "Quantity", FieldKind::Integer),
            FieldDef::optional("work_center", "Work center", FieldKind::Text),
            FieldDef::optional("due_date", "Due date", FieldKind::Date),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Planned",
            transitions: &[
                Transition { action: "release", from: &["Planned"], to: "Released" },
                Transition { action: "start", from: &["Released"], to: "InProgress" },
                Transition { action: "complete", from: &["InProgress"], to: "Completed" },
                Transition { action: "cancel", from: &["Planned", "Released"], to: "Cancelled" },
            ],
        }),
    },
    ResourceDef {
        module: "gl",
        name: "ledger-sets",
        label: "Ledger sets",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::required("currency", "Currency", FieldKind::Text),
            FieldDef::optional("calendar", "Calendar", FieldKind::Text),
            FieldDef::optional("description", "Description", FieldKind::Text),
        ],
        lifecycle: None,
    },
    ResourceDef {
        module: "gl",
        name: "legal-entities",
        label: "Legal entities",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::required("country", "Country", FieldKind::Text),
            FieldDef::required("currency", "Functional currency", FieldKind::Text),
            FieldDef::optional("tax_id", "Tax ID", FieldKind::Text),
            FieldDef::optional("ledger_set", "Ledger set", FieldKind::Text),
        ],
        lifecycle: None,
    },
    ResourceDef {
        module: "ar",
        name: "billing-rules",
        label: "Billing rules",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::required("frequency", "Frequency", FieldKind::Enum(BILLING_FREQUENCIES)),
            FieldDef::optional("amount", "Amount", FieldKind::Number),
            FieldDef::optional("billing_method", "Billing method", FieldKind::Enum(BILLING_METHODS)),
        ],
        lifecycle: Some(Lifecycle { initial: "Active", transitions: ACTIVATION }),
    },
    ResourceDef {
        module: "ar",
        name: "revenue-contracts",
        label: "Revenue contracts",
        fields: &[
            FieldDef::required("customer", "Customer", FieldKind::Text),
            FieldDef::required("contract_number", "Contract #", FieldKind::Text),
            FieldDef::required("contract_value", "Contract value", FieldKind::Number),
            FieldDef::optional("ssp", "Standalone selling price", FieldKind::Number),
            FieldDef::optional("start_date", "Start", FieldKind::Date),
            FieldDef::optional("end_date", "End", FieldKind::Date),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Draft",
            transitions: &[
                Transition { action: "activate", from: &["Draft"], to: "Active" },
                Transition { action: "complete", from: &["Active"], to: "Completed" },
            ],
        }),
    },
    ResourceDef {
        module: "projects",
        name: "resources",
        label: "Project resources",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::required("role", "Role", FieldKind::Text),
            FieldDef::optional("hourly_rate", "Hourly rate", FieldKind::Number),
            FieldDef::optional("capacity_hours", "Capacity (h)", FieldKind::Number),
        ],
        lifecycle: None,
    },
    ResourceDef {
        module: "risk",
        name: "register",
        label: "Risk register",
        fields: &[
            FieldDef::required("title", "Title", FieldKind::Text),
            FieldDef::optional("category", "Category", FieldKind::Enum(RISK_CATEGORIES)),
            FieldDef::required("likelihood", "Likelihood", FieldKind::Enum(RISK_LEVELS)),
            FieldDef::required("impact", "Impact", FieldKind::Enum(RISK_LEVELS)),
            FieldDef::optional("owner", "Owner", FieldKind::Text),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Open",
            transitions: &[
                Transition { action: "mitigate", from: &["Open"], to: "Mitigating" },
                Transition { action: "close", from: &["Open", "Mitigating"], to: "Closed" },
                Transition { action: "reopen", from: &["Closed"], to: "Open" },
            ],
        }),
    },
    ResourceDef {
        module: "wms",
        name: "strategies",
        label: "Warehouse strategies",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::required("method", "Method", FieldKind::Enum(PICK_METHODS)),
            FieldDef::required("warehouse", "Warehouse", FieldKind::Text),
            FieldDef::optional("priority", "Priority", FieldKind::Integer),
        ],
        lifecycle: Some(Lifecycle { initial: "Active", transitions: ACTIVATION }),
    },
    ResourceDef {
        module: "wms",
        name: "dock-appointments",
        label: "Dock appointments",
        fields: &[
            FieldDef::required("carrier", "Carrier", FieldKind::Text),
            FieldDef::required("dock", "Dock", FieldKind::Text),
            FieldDef::required("scheduled_on", "Date", FieldKind::Date),
            FieldDef::optional("slot", "Slot", FieldKind::Text),
            FieldDef::optional("trailer", "Trailer", FieldKind::Text),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Scheduled",
            transitions: &[
                Transition { action: "check-in", from: &["Scheduled"], to: "CheckedIn" },
                Transition { action: "complete", from: &["CheckedIn"], to: "Completed" },
                Transition { action: "cancel", from: &["Scheduled"], to: "Cancelled" },
            ],
        }),
    },
    ResourceDef {
        module: "crm",
        name: "leads",
        label: "Leads",
        fields: &[
            FieldDef::required("name", "Name", FieldKind::Text),
            FieldDef::optional("company", "Company", FieldKind::Text),
            FieldDef::optional("email", "Email", FieldKind::Text),
            FieldDef::optional("source", "Source", FieldKind::Enum(LEAD_SOURCES)),
            FieldDef::optional("estimated_value", "Estimated value", FieldKind::Number),
        ],
        lifecycle: Some(Lifecycle {
            initial: "New",
            transitions: &[
                Transition { action: "qualify", from: &["New"], to: "Qualified" },
                Transition { action: "convert", from: &["Qualified"], to: "Converted" },
                Transition { action: "disqualify", from: &["New", "Qualified"], to: "Disqualified" },
            ],
        }),
    },
    ResourceDef {
        module: "hr",
        name: "employees",
        label: "Employees",
        fields: &[
            FieldDef::required("first_name", "First name", FieldKind::Text),
            FieldDef::required("last_name", "Last name", FieldKind::Text),
            FieldDef::required("email", "Email", FieldKind::Text),
            FieldDef::optional("department", "Department", FieldKind::Text),
            FieldDef::optional("hire_date", "Hire date", FieldKind::Date),
            FieldDef::optional("salary", "Salary", FieldKind::Number),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Active",
            transitions: &[
                Transition { action: "terminate", from: &["Active"], to: "Terminated" },
                Transition { action: "rehire", from: &["Terminated"], to: "Active" },
            ],
        }),
    },
    ResourceDef {
        module: "treasury",
        name: "bank-accounts",
        label: "Bank accounts",
        fields: &[
            FieldDef::required("bank_name", "Bank", FieldKind::Text),
            FieldDef::required("account_name", "Account name", FieldKind::Text),
            FieldDef::required("account_number", "Account #", FieldKind::Text),
            FieldDef::required("currency", "Currency", FieldKind::Text),
            FieldDef::optional("balance", "Balance", FieldKind::Number),
        ],
        lifecycle: Some(Lifecycle {
            initial: "Open",
            transitions: &[Transition { action: "close", from: &["Open"], to: "Closed" }],
        }),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_keys_are_unique() {
        let catalog = Catalog::standard();
        let keys: HashSet<_> = catalog.iter().map(ResourceDef::key).collect();
        assert_eq!(keys.len(), catalog.len());
    }

    #[test]
    fn standard_field_names_are_unique_per_resource() {
        for def in Catalog::standard().iter() {
            let names: HashSet<_> = def.fields.iter().map(|f| f.name).collect();
            assert_eq!(names.len(), def.fields.len(), "{}", def.key());
        }
    }

    #[test]
    fn every_transition_target_is_reachable_from_initial_or_a_source() {
        for def in Catalog::standard().iter() {
            let Some(lc) = def.lifecycle else { continue };
            let mut known: HashSet<&str> = HashSet::from([lc.initial]);
            for t in lc.transitions {
                known.insert(t.to);
            }
            for t in lc.transitions {
                for from in t.from {
                    assert!(known.contains(from), "{}: {} from unknown {}", def.key(), t.action, from);
                }
            }
        }
    }

    #[test]
    fn paths_follow_module_and_name() {
        let catalog = Catalog::standard();
        let def = catalog.find("ap", "invoices").unwrap();
        assert_eq!(def.collection_path(), "/api/ap/invoices");
        assert_eq!(def.item_path("abc"), "/api/ap/invoices/abc");
        assert_eq!(def.action_path("abc", "approve"), "/api/ap/invoices/abc/approve");
        assert!(catalog.find("ap", "nope").is_none());
    }

    #[test]
    fn apply_follows_the_lifecycle() {
        let lc = Lifecycle { initial: "Draft", transitions: APPROVAL_FLOW };
        assert_eq!(lc.apply(Some("Draft"), "submit").unwrap(), "Submitted");
        assert_eq!(lc.apply(Some("Submitted"), "approve").unwrap(), "Approved");
        assert_eq!(lc.apply(None, "submit").unwrap(), "Submitted");
    }

    #[test]
    fn apply_is_idempotent_at_the_target() {
        let lc = Lifecycle { initial: "Draft", transitions: APPROVAL_FLOW };
        assert_eq!(lc.apply(Some("Approved"), "approve").unwrap(), "Approved");
    }

    #[test]
    fn apply_rejects_out_of_order_actions() {
        let lc = Lifecycle { initial: "Draft", transitions: APPROVAL_FLOW };
        let err = lc.apply(Some("Draft"), "approve").unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("cannot approve a record in status Draft"));
        assert_eq!(lc.apply(Some("Approved"), "reject").unwrap_err(), DomainError::invalid_transition("cannot reject a record in status Approved"));
    }

    #[test]
    fn unknown_action_is_not_found() {
        let lc = Lifecycle { initial: "Draft", transitions: APPROVAL_FLOW };
        assert_eq!(lc.apply(Some("Draft"), "explode").unwrap_err(), DomainError::NotFound);
    }
}
