//! Node and edge types for architecture diagrams.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EdgeId, NodeId};

/// Free-form configuration attached to nodes and edges
pub type Config = BTreeMap<String, serde_json::Value>;

/// Default node footprint on the canvas
pub const DEFAULT_NODE_SIZE: Size = Size {
    width: 120.0,
    height: 80.0,
};

/// A point on the diagram canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Offset by a delta. Coordinates never go below zero.
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            x: (self.x + dx).max(0.0),
            y: (self.y + dy).max(0.0),
        }
    }

    /// Round to the nearest grid intersection
    pub fn snapped(self, grid: f64) -> Self {
        if grid <= 0.0 {
            return self;
        }
        Self {
            x: (self.x / grid).round() * grid,
            y: (self.y / grid).round() * grid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        DEFAULT_NODE_SIZE
    }
}

/// Component kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Compute,
    Storage,
    Database,
    Network,
    Security,
    Serverless,
    Analytics,
    Ml,
    Container,
}

impl ResourceKind {
    /// Short label for list displays
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Compute => "compute",
            ResourceKind::Storage => "storage",
            ResourceKind::Database => "database",
            ResourceKind::Network => "network",
            ResourceKind::Security => "security",
            ResourceKind::Serverless => "serverless",
            ResourceKind::Analytics => "analytics",
            ResourceKind::Ml => "ml",
            ResourceKind::Container => "container",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    #[default]
    Aws,
    Azure,
    Gcp,
}

impl CloudProvider {
    pub fn name(self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "Azure",
            CloudProvider::Gcp => "GCP",
        }
    }
}

/// Kind of link between two components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    #[default]
    Http,
    Tcp,
    Queue,
    Event,
    Database,
    Api,
    WebSocket,
}

impl ConnectionKind {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionKind::Http => "HTTP/HTTPS",
            ConnectionKind::Tcp => "TCP/IP",
            ConnectionKind::Queue => "Message Queue",
            ConnectionKind::Event => "Event",
            ConnectionKind::Database => "Database",
            ConnectionKind::Api => "API",
            ConnectionKind::WebSocket => "WebSocket",
        }
    }
}

/// A component box on the diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: ResourceKind,
    #[serde(default)]
    pub provider: CloudProvider,
    pub label: String,
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub config: Config,
}

impl Node {
    pub fn new(kind: ResourceKind, label: impl Into<String>, position: Position) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            provider: CloudProvider::default(),
            label: label.into(),
            position,
            size: Size::default(),
            config: Config::new(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_provider(mut self, provider: CloudProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub kind: ConnectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Config::is_empty")]
    pub config: Config,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            kind: ConnectionKind::default(),
            label: None,
            config: Config::new(),
        }
    }

    pub fn with_id(mut self, id: EdgeId) -> Self {
        self.id = id;
        self
    }

    pub fn with_kind(mut self, kind: ConnectionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether either endpoint is `node`
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }
}
