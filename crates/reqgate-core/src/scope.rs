//! # Scope Tree
//!
//! One [`ScopeNode`] per plugin-registration boundary. Children are owned by
//! their parent; the parent link is a [`Weak`] used only to walk upward
//! during resolution.
//!
//! ## Resolution
//!
//! [`ScopeNode::resolve_compiler`] starts at a node and walks the parent
//! chain, returning the first override found (the start node included). The
//! root additionally holds the process-wide default compiler in a separate
//! slot, consulted only after the root's own override. Nothing is copied
//! into children at creation, so an override set on a parent after a child
//! exists still reaches that child.
//!
//! ## Encapsulation
//!
//! The walk only ever goes up. An override on a node can therefore reach
//! the node's own routes and its descendants, never siblings or ancestors.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::compiler::SharedCompiler;
use crate::error::ConfigurationError;

const ROOT_NAME: &str = "root";

/// A node in the scope tree.
pub struct ScopeNode {
    name: String,
    depth: usize,
    parent: Weak<ScopeNode>,
    compiler: OnceLock<SharedCompiler>,
    /// Present on the root only.
    default_compiler: Option<SharedCompiler>,
    children: RwLock<Vec<Arc<ScopeNode>>>,
}

impl ScopeNode {
    /// Create a root scope whose fallback is `default_compiler`.
    pub fn root(default_compiler: SharedCompiler) -> Arc<Self> {
        Arc::new(Self {
            name: ROOT_NAME.to_string(),
            depth: 0,
            parent: Weak::new(),
            compiler: OnceLock::new(),
            default_compiler: Some(default_compiler),
            children: RwLock::new(Vec::new()),
        })
    }

    /// Create a child scope and append it to this node's children.
    pub fn child(self: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        let child = Arc::new(Self {
            name: name.into(),
            depth: self.depth + 1,
            parent: Arc::downgrade(self),
            compiler: OnceLock::new(),
            default_compiler: None,
            children: RwLock::new(Vec::new()),
        });
        self.children.write().push(Arc::clone(&child));
        tracing::debug!(scope = %child.path(), "created child scope");
        child
    }

    /// Attach a compiler override to this scope.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateCompiler`] if one is already attached.
    pub fn set_schema_compiler(&self, compiler: SharedCompiler) -> Result<(), ConfigurationError> {
        self.compiler
            .set(compiler)
            .map_err(|_| ConfigurationError::DuplicateCompiler { scope: self.path() })?;
        tracing::debug!(scope = %self.path(), "schema compiler override attached");
        Ok(())
    }

    /// This node's own override, ignoring ancestors.
    pub fn schema_compiler(&self) -> Option<&SharedCompiler> {
        self.compiler.get()
    }

    /// Resolve the compiler that applies to routes owned by this node.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DetachedScope`] if an ancestor was dropped
    /// before the root was reached.
    pub fn resolve_compiler(self: &Arc<Self>) -> Result<SharedCompiler, ConfigurationError> {
        let mut node = Arc::clone(self);
        loop {
            if let Some(compiler) = node.compiler.get() {
                return Ok(Arc::clone(compiler));
            }
            if let Some(default) = &node.default_compiler {
                return Ok(Arc::clone(default));
            }
            node = node
                .parent
                .upgrade()
                .ok_or_else(|| ConfigurationError::DetachedScope { scope: self.path() })?;
        }
    }

    /// The parent scope, `None` at the root.
    pub fn parent(&self) -> Option<Arc<ScopeNode>> {
        self.parent.upgrade()
    }

    /// Children in creation order.
    pub fn children(&self) -> Vec<Arc<ScopeNode>> {
        self.children.read().clone()
    }

    /// Whether this is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.default_compiler.is_some()
    }

    /// Nesting depth, 0 at the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash-separated names from the root, e.g. `root/auth/admin`.
    pub fn path(&self) -> String {
        let mut names = vec![self.name.clone()];
        let mut current = self.parent.upgrade();
        while let Some(node) = current {
            names.push(node.name.clone());
            current = node.parent.upgrade();
        }
        names.reverse();
        names.join("/")
    }

    /// The root of this node's tree, if still reachable.
    pub fn root_of(self: &Arc<Self>) -> Option<Arc<ScopeNode>> {
        let mut node = Arc::clone(self);
        while !node.is_root() {
            node = node.parent.upgrade()?;
        }
        Some(node)
    }
}

impl fmt::Debug for ScopeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeNode")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("has_override", &self.compiler.get().is_some())
            .field("children", &self.children.read().len())
            .finish()
    }
}
