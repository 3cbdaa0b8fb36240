//! Change events carried on the bus.
//!
//! Events serialize as `{ "type": "...", "payload": { ... } }` so that the
//! wire shape matches what browser-side consumers expect.

use serde::{Deserialize, Serialize};

/// What a VFS mutation did. Informational only: subscribers re-read state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileOp {
    Created,
    Modified,
    Deleted,
    Moved,
    Restored,
}

/// Optional placement hints attached to an agent widget request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRequest {
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub widget_type: Option<String>,
}

/// Every event the desktop bus can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ChangeEvent {
    /// The VFS changed. Consumers must treat this as "re-read now".
    FileChange {
        op: FileOp,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dest: Option<String>,
    },
    /// A user-facing toast.
    Notification { title: String, message: String },
    /// An agent asked for a widget to be placed on the desktop.
    AgentCreateWidget(WidgetRequest),
    #[serde(rename_all = "camelCase")]
    WindowOpen { app_id: String },
    #[serde(rename_all = "camelCase")]
    WindowClose { app_id: String },
    #[serde(rename_all = "camelCase")]
    WindowFocus { app_id: String },
    #[serde(rename_all = "camelCase")]
    AppInstalled { app_id: String },
    #[serde(rename_all = "camelCase")]
    AppUninstalled { app_id: String },
}

impl ChangeEvent {
    /// The wire `type` tag, handy for log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FileChange { .. } => "file-change",
            Self::Notification { .. } => "notification",
            Self::AgentCreateWidget(_) => "agent-create-widget",
            Self::WindowOpen { .. } => "window-open",
            Self::WindowClose { .. } => "window-close",
            Self::WindowFocus { .. } => "window-focus",
            Self::AppInstalled { .. } => "app-installed",
            Self::AppUninstalled { .. } => "app-uninstalled",
        }
    }

    pub fn is_file_change(&self) -> bool {
        matches!(self, Self::FileChange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_change_wire_shape() {
        let e = ChangeEvent::FileChange {
            op: FileOp::Created,
            path: "/home/aussie/Desktop/NewFolder".into(),
            dest: None,
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "file-change");
        assert_eq!(v["payload"]["op"], "created");
        assert_eq!(v["payload"]["path"], "/home/aussie/Desktop/NewFolder");
        assert!(v["payload"].get("dest").is_none());
    }

    #[test]
    fn agent_widget_parses_partial_payload() {
        let json = r#"{"type":"agent-create-widget","payload":{"widgetType":"clock"}}"#;
        let e: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            e,
            ChangeEvent::AgentCreateWidget(WidgetRequest {
                x: None,
                y: None,
                widget_type: Some("clock".into()),
            })
        );
    }

    #[test]
    fn agent_widget_parses_empty_payload() {
        let json = r#"{"type":"agent-create-widget","payload":{}}"#;
        let e: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(e, ChangeEvent::AgentCreateWidget(WidgetRequest::default()));
    }

    #[test]
    fn window_events_use_camel_case_payload() {
        let e = ChangeEvent::WindowOpen {
            app_id: "editor".into(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "window-open");
        assert_eq!(v["payload"]["appId"], "editor");
    }

    #[test]
    fn type_name_matches_tag() {
        let events = [
            ChangeEvent::FileChange {
                op: FileOp::Deleted,
                path: "/x".into(),
                dest: None,
            },
            ChangeEvent::Notification {
                title: "t".into(),
                message: "m".into(),
            },
            ChangeEvent::AgentCreateWidget(WidgetRequest::default()),
            ChangeEvent::AppInstalled {
                app_id: "notes".into(),
            },
        ];
        for e in events {
            let v = serde_json::to_value(&e).unwrap();
            assert_eq!(v["type"], e.type_name());
        }
    }
}
