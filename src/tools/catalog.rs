use serde_json::Value;

use super::accounts::{
    self, AccountDetailsParams, AccountIdParams, AccountNoteParams, DeleteAccountNoteParams,
    ListAccountsParams, UpdateAccountTagsParams,
};
use super::assignments::{
    self, AssignmentIdParams, CreateAssignmentParams, EntityAssignmentsParams,
    ListAssignmentsParams, UserAssignmentsParams,
};
use super::detections::{
    self, DetectionCountParams, DetectionIdParams, DetectionNoteParams, ListDetectionsParams,
    MarkDetectionFixedParams, UpdateDetectionTagsParams,
};
use super::error::ToolError;
use super::hosts::{
    self, DeleteHostNoteParams, HostIdParams, HostNoteParams, InvestigateHostParams,
    ListHostsParams, UpdateHostTagsParams,
};
use super::management::{self, ListUsersParams};
use super::params::{parse_params, schema_of};
use super::search::{self, AdvancedSearchParams, UnifiedSearchParams};
use super::JsonObject;
use crate::vectra::VectraClient;

macro_rules! tool_catalog {
    ($( $variant:ident => $name:literal, $params:ty, $handler:path, $description:literal; )+) => {
        /// Every tool the server exposes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ToolKind {
            $($variant),+
        }

        /// A call whose arguments passed validation, ready to execute.
        #[derive(Debug)]
        pub enum ValidatedCall {
            $($variant($params)),+
        }

        impl ToolKind {
            pub const ALL: &'static [ToolKind] = &[$(ToolKind::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(ToolKind::$variant => $name),+
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $(ToolKind::$variant => $description),+
                }
            }

            pub fn input_schema(self) -> JsonObject {
                match self {
                    $(ToolKind::$variant => schema_of::<$params>()),+
                }
            }

            pub fn validate(self, arguments: JsonObject) -> Result<ValidatedCall, ToolError> {
                match self {
                    $(ToolKind::$variant => parse_params::<$params>(arguments).map(ValidatedCall::$variant)),+
                }
            }
        }

        impl ValidatedCall {
            pub fn kind(&self) -> ToolKind {
                match self {
                    $(ValidatedCall::$variant(_) => ToolKind::$variant),+
                }
            }

            pub async fn execute(self, client: &VectraClient) -> Result<Value, ToolError> {
                match self {
                    $(ValidatedCall::$variant(params) => $handler(client, params).await),+
                }
            }
        }
    };
}

tool_catalog! {
    ListDetections => "list_detections", ListDetectionsParams, detections::list_detections,
        "List detections with optional severity, state, category, source and date filters. Returns normalized detection records, the item count and whether the result was truncated.";
    ListDetectionIds => "list_detection_ids", ListDetectionsParams, detections::list_detection_ids,
        "List only the IDs of detections matching the given filters. Useful to enumerate large result sets cheaply.";
    GetDetectionCount => "get_detection_count", DetectionCountParams, detections::get_detection_count,
        "Count detections matching the given filters without fetching them.";
    GetDetectionDetails => "get_detection_details", DetectionIdParams, detections::get_detection_details,
        "Get the full normalized record of one detection. Severity is critical when threat and certainty are both >= 50, high when only threat is, medium when only certainty is, low otherwise.";
    GetDetectionSummary => "get_detection_summary", DetectionIdParams, detections::get_detection_summary,
        "Get a concise summary of one detection: name, category, state, severity, last seen, triage status and the event summary.";
    CreateDetectionNote => "create_detection_note", DetectionNoteParams, detections::create_detection_note,
        "Add a note to a detection.";
    GetDetectionTags => "get_detection_tags", DetectionIdParams, detections::get_detection_tags,
        "Get the tags of a detection.";
    UpdateDetectionTags => "update_detection_tags", UpdateDetectionTagsParams, detections::update_detection_tags,
        "Replace the tags of a detection with the given list.";
    MarkDetectionFixed => "mark_detection_fixed", MarkDetectionFixedParams, detections::mark_detection_fixed,
        "Mark one or more detections as fixed, or clear the fixed state.";

    ListHosts => "list_hosts", ListHostsParams, hosts::list_hosts,
        "List hosts with optional state, severity, score, name, tag and key asset filters.";
    GetHostDetails => "get_host_details", HostIdParams, hosts::get_host_details,
        "Get the normalized record of one host, including its detection IDs and assignee.";
    InvestigateHost => "investigate_host", InvestigateHostParams, hosts::investigate_host,
        "Collect a host's record, its detections and its notes in one call to start an investigation.";
    AddHostNote => "add_host_note", HostNoteParams, hosts::add_host_note,
        "Add a note to a host.";
    DeleteHostNote => "delete_host_note", DeleteHostNoteParams, hosts::delete_host_note,
        "Delete a note from a host.";
    GetHostTags => "get_host_tags", HostIdParams, hosts::get_host_tags,
        "Get the tags of a host.";
    UpdateHostTags => "update_host_tags", UpdateHostTagsParams, hosts::update_host_tags,
        "Replace the tags of a host with the given list.";

    ListAccounts => "list_accounts", ListAccountsParams, accounts::list_accounts,
        "List accounts with optional state, severity, score, name, type and tag filters.";
    GetAccountDetails => "get_account_details", AccountDetailsParams, accounts::get_account_details,
        "Get the normalized record of one account. Pass 'fields' to also receive the raw values of selected upstream fields.";
    AddAccountNote => "add_account_note", AccountNoteParams, accounts::add_account_note,
        "Add a note to an account.";
    DeleteAccountNote => "delete_account_note", DeleteAccountNoteParams, accounts::delete_account_note,
        "Delete a note from an account.";
    GetAccountTags => "get_account_tags", AccountIdParams, accounts::get_account_tags,
        "Get the tags of an account.";
    UpdateAccountTags => "update_account_tags", UpdateAccountTagsParams, accounts::update_account_tags,
        "Replace the tags of an account with the given list.";

    ListAssignments => "list_assignments", ListAssignmentsParams, assignments::list_assignments,
        "List analyst assignments, optionally filtered by resolution, creation date, hosts, accounts or assignees.";
    ListAssignmentsForUser => "list_assignments_for_user", UserAssignmentsParams, assignments::list_assignments_for_user,
        "List the assignments owned by one user.";
    GetAssignmentDetailById => "get_assignment_detail_by_id", AssignmentIdParams, assignments::get_assignment_detail_by_id,
        "Get one assignment by ID.";
    GetEntityAssignments => "get_entity_assignments", EntityAssignmentsParams, assignments::get_entity_assignments,
        "List the assignments of the given hosts or accounts.";
    CreateAssignment => "create_assignment", CreateAssignmentParams, assignments::create_assignment,
        "Assign a host or an account to a user.";
    DeleteAssignment => "delete_assignment", AssignmentIdParams, assignments::delete_assignment,
        "Delete an assignment.";

    ListPlatformUsers => "list_platform_users", ListUsersParams, management::list_platform_users,
        "List Vectra platform users, optionally filtered by username, role, account type, authentication profile or last login.";

    AdvancedSearchDetections => "advanced_search_detections", AdvancedSearchParams, search::advanced_search_detections,
        "Search detections with a query string, e.g. 'detection.threat:>=50 AND detection.state:\"active\"'.";
    AdvancedSearchHosts => "advanced_search_hosts", AdvancedSearchParams, search::advanced_search_hosts,
        "Search hosts with a query string, e.g. 'host.name:\"db*\" AND host.is_key_asset:true'.";
    AdvancedSearchAccounts => "advanced_search_accounts", AdvancedSearchParams, search::advanced_search_accounts,
        "Search accounts with a query string, e.g. 'account.privilege_level:[8 TO 10]'.";
    UnifiedSearch => "unified_search", UnifiedSearchParams, search::unified_search,
        "Run one query string across accounts, hosts and detections. Results are keyed by entity type, and a failing type reports its own error without failing the others.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("arguments must be an object"),
        }
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), ToolKind::ALL.len());
        assert_eq!(ToolKind::ALL.len(), 33);
    }

    #[test]
    fn test_schemas_are_objects() {
        for kind in ToolKind::ALL {
            let schema = kind.input_schema();
            assert_eq!(schema.get("type"), Some(&json!("object")), "{}", kind.name());
            assert!(!kind.description().is_empty());
        }
    }

    #[test]
    fn test_enum_values_published() {
        let schema = Value::Object(ToolKind::ListDetections.input_schema()).to_string();
        for value in ["critical", "filteredbyrule", "exfiltration"] {
            assert!(schema.contains(value), "schema lacks {}", value);
        }
    }

    #[test]
    fn test_validate_accepts_spec_example() {
        let call = ToolKind::ListDetections
            .validate(args(json!({"severity": "high", "cursor": null})))
            .unwrap();
        assert_eq!(call.kind(), ToolKind::ListDetections);
        match call {
            ValidatedCall::ListDetections(params) => {
                assert_eq!(params.severity, Some(crate::vectra::models::Severity::High));
                assert!(params.cursor.is_none());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejections() {
        let cases = [
            (ToolKind::ListDetections, json!({"severity": "urgent"})),
            (ToolKind::ListDetections, json!({"limit": 0})),
            (ToolKind::ListDetections, json!({"bogus": 1})),
            (ToolKind::ListDetections, json!({"start_date": "2024-02-02", "end_date": "2024-01-01"})),
            (ToolKind::ListDetections, json!({"src_ip": "not-an-ip"})),
            (ToolKind::GetHostDetails, json!({})),
            (ToolKind::GetHostDetails, json!({"host_id": "seven"})),
            (ToolKind::GetHostDetails, json!({"host_id": -1})),
            (ToolKind::AddHostNote, json!({"host_id": 1, "note": "  "})),
            (ToolKind::CreateAssignment, json!({"assign_to_user_id": 1, "assign_entity_id": 2, "assign_entity_type": "detection"})),
            (ToolKind::MarkDetectionFixed, json!({"detection_ids": [], "mark_fixed": true})),
            (ToolKind::ListHosts, json!({"ordering": "-colour"})),
            (ToolKind::AdvancedSearchHosts, json!({"query_string": ""})),
            (ToolKind::UnifiedSearch, json!({"query_string": "x", "entity_types": []})),
        ];
        for (kind, arguments) in cases {
            let err = kind.validate(args(arguments.clone())).unwrap_err();
            assert_eq!(
                err.kind(),
                crate::vectra::ErrorKind::ValidationError,
                "{} {}",
                kind.name(),
                arguments
            );
        }
    }
}
