//! Descriptor → render instruction lowering.
//!
//! A [`Factory`] is the Rust counterpart of one binding in the synthesized
//! module: called with caller properties it yields a [`RenderNode`] tree. The
//! generated JavaScript in [`crate::synth`] follows the same rules.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::descriptor::{Children, Descriptor};

/// Caller-supplied properties.
pub type Props = Map<String, Value>;

/// Instruction to render `component_type` with `props` and `children`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderNode {
    pub component_type: String,
    pub props: Props,
    pub children: RenderChildren,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderChildren {
    None,
    Text(String),
    Node(Box<RenderNode>),
    Nodes(Vec<RenderNode>),
}

/// Component factory backed by a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Factory {
    descriptor: Arc<Descriptor>,
}

impl Factory {
    #[must_use]
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Produce the render instruction for this component.
    ///
    /// Properties merge as style, then extra, then `props`; later sources win.
    #[must_use]
    pub fn call(&self, props: &Props) -> RenderNode {
        lower(&self.descriptor, props)
    }
}

fn lower(descriptor: &Descriptor, caller: &Props) -> RenderNode {
    let mut props = Props::new();
    if let Some(style) = &descriptor.style {
        for (key, value) in style {
            props.insert(key.clone(), Value::String(value.clone()));
        }
    }
    for (key, value) in &descriptor.extra {
        props.insert(key.clone(), value.clone());
    }
    for (key, value) in caller {
        props.insert(key.clone(), value.clone());
    }

    let children = match &descriptor.children {
        None => RenderChildren::None,
        Some(Children::Text(text)) => RenderChildren::Text(text.clone()),
        Some(Children::One(child)) => RenderChildren::Node(Box::new(lower(child, &Props::new()))),
        Some(Children::Many(items)) => {
            RenderChildren::Nodes(items.iter().map(|c| lower(c, &Props::new())).collect())
        }
    };

    RenderNode {
        component_type: descriptor.component_type.clone(),
        props,
        children,
    }
}
