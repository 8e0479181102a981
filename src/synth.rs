//! Virtual module synthesis.
//!
//! Turns the prompt cache into JavaScript source exporting one component
//! factory per cached prompt, plus a manifest mapping each raw prompt to the
//! name of its binding.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::PromptCache;
use crate::descriptor::Descriptor;
use crate::sanitize::{is_identifier, sanitize};

/// Specifier UI code imports the generated components from.
pub const VIRTUAL_MODULE_ID: &str = "virtual:generated-components";

/// Resolved id of the virtual module. The NUL prefix keeps other resolvers
/// away from it.
pub const RESOLVED_VIRTUAL_MODULE_ID: &str = "\0virtual:generated-components";

/// Name of the exported prompt → binding manifest.
pub const MANIFEST_EXPORT: &str = "__aiGenManifest";

const NODE_HELPER: &str = "__aiGenNode";

const PRELUDE: &str = r"import React from 'react';

const __aiGenNode = (d, props) => {
  const { componentType, style, children, ...extra } = d;
  const merged = { ...style, ...extra, ...props };
  if (children == null) return React.createElement(componentType, merged);
  if (typeof children === 'string') return React.createElement(componentType, merged, children);
  if (Array.isArray(children)) {
    return React.createElement(componentType, merged, ...children.map((c) => __aiGenNode(c, {})));
  }
  return React.createElement(componentType, merged, __aiGenNode(children, {}));
};
";

const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "React",
    NODE_HELPER, MANIFEST_EXPORT,
];

/// How to handle distinct prompts that sanitize to the same identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Later prompts get `_2`, `_3`, ... appended.
    #[default]
    Suffix,
    /// The later prompt replaces the earlier binding.
    Shadow,
}

/// Two prompts competing for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub identifier: String,
    /// Prompt that claimed the identifier first.
    pub existing: String,
    /// Prompt that collided with it.
    pub incoming: String,
    /// Binding the incoming prompt ended up with. Under
    /// [`CollisionPolicy::Shadow`] this is the shared identifier.
    pub assigned: String,
}

/// One exported factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub prompt: String,
    pub descriptor: Descriptor,
}

/// Result of synthesizing the module.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    pub source: String,
    /// Raw prompt → binding name.
    pub manifest: IndexMap<String, String>,
    /// Binding name → exported factory, in emission order.
    pub bindings: IndexMap<String, Binding>,
    pub collisions: Vec<Collision>,
}

impl Synthesis {
    /// Data view of the module for consumers that cannot evaluate the source.
    pub fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            manifest: self.manifest.clone(),
            bindings: self
                .bindings
                .iter()
                .map(|(name, binding)| (name.clone(), binding.descriptor.clone()))
                .collect(),
        }
    }
}

/// Exported bindings of the module as data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Raw prompt → binding name.
    pub manifest: IndexMap<String, String>,
    /// Binding name → descriptor.
    pub bindings: IndexMap<String, Descriptor>,
}

/// Generate module source from the cache. Never fails.
pub fn synthesize(cache: &PromptCache, policy: CollisionPolicy) -> Synthesis {
    let mut manifest = IndexMap::new();
    let mut bindings: IndexMap<String, Binding> = IndexMap::new();
    let mut collisions = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();

    for (prompt, descriptor) in cache.iter() {
        let base = binding_name(&sanitize(prompt));
        let binding = Binding {
            prompt: prompt.clone(),
            descriptor: descriptor.clone(),
        };

        let Some(existing) = bindings.get_mut(&base) else {
            taken.insert(base.clone());
            manifest.insert(prompt.clone(), base.clone());
            bindings.insert(base, binding);
            continue;
        };

        let assigned = match policy {
            CollisionPolicy::Shadow => {
                let previous = std::mem::replace(existing, binding);
                collisions.push(Collision {
                    identifier: base.clone(),
                    existing: previous.prompt,
                    incoming: prompt.clone(),
                    assigned: base.clone(),
                });
                base
            }
            CollisionPolicy::Suffix => {
                let assigned = (2..)
                    .map(|n| format!("{base}_{n}"))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_default();
                collisions.push(Collision {
                    identifier: base.clone(),
                    existing: existing.prompt.clone(),
                    incoming: prompt.clone(),
                    assigned: assigned.clone(),
                });
                taken.insert(assigned.clone());
                bindings.insert(assigned.clone(), binding);
                assigned
            }
        };
        manifest.insert(prompt.clone(), assigned);
    }

    let source = render_source(&bindings, &manifest);
    Synthesis {
        source,
        manifest,
        bindings,
        collisions,
    }
}

/// Map a sanitized prompt onto a name that is safe to emit.
fn binding_name(sanitized: &str) -> String {
    if !is_identifier(sanitized) || RESERVED.contains(&sanitized) {
        format!("_{sanitized}")
    } else {
        sanitized.to_string()
    }
}

fn render_source(bindings: &IndexMap<String, Binding>, manifest: &IndexMap<String, String>) -> String {
    let mut code = String::from(PRELUDE);
    code.push('\n');
    for (name, binding) in bindings {
        // Serializing plain data into a JSON literal cannot fail.
        let data = serde_json::to_string(&binding.descriptor).unwrap_or_else(|_| "{}".to_string());
        code.push_str(&format!(
            "export const {name} = (props) => {NODE_HELPER}({data}, props);\n"
        ));
    }
    let manifest = serde_json::to_string(manifest).unwrap_or_else(|_| "{}".to_string());
    code.push_str(&format!("\nexport const {MANIFEST_EXPORT} = {manifest};\n"));
    code
}

/// The dev server's view of the generated-components module.
#[derive(Debug, Clone)]
pub struct VirtualModule {
    cache: Arc<RwLock<PromptCache>>,
    policy: CollisionPolicy,
}

impl VirtualModule {
    pub fn new(cache: Arc<RwLock<PromptCache>>, policy: CollisionPolicy) -> Self {
        Self { cache, policy }
    }

    /// Claim the virtual specifier.
    pub fn resolve_id(&self, id: &str) -> Option<&'static str> {
        (id == VIRTUAL_MODULE_ID).then_some(RESOLVED_VIRTUAL_MODULE_ID)
    }

    /// Regenerate the module from the current cache.
    pub async fn load(&self, id: &str) -> Option<Synthesis> {
        if id != RESOLVED_VIRTUAL_MODULE_ID {
            return None;
        }
        let synthesis = {
            let cache = self.cache.read().await;
            synthesize(&cache, self.policy)
        };
        for collision in &synthesis.collisions {
            warn!(
                name: "synth.collision",
                identifier = %collision.identifier,
                existing = %collision.existing,
                incoming = %collision.incoming,
                assigned = %collision.assigned,
                policy = ?self.policy,
                "Prompts sanitize to the same identifier"
            );
        }
        debug!(
            name: "synth.loaded",
            bindings = synthesis.bindings.len(),
            bytes = synthesis.source.len(),
            "Generated components module synthesized"
        );
        Some(synthesis)
    }
}
