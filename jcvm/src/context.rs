//! Execution contexts.

use jcvm_types::{AppletId, PackageId};

use crate::stack::Stack;

/// The firewall domain of one applet: its identity, the package of the
/// method it is currently executing, and its own frame stack.
///
/// The interpreter keeps contexts in a LIFO list; the head is active, and a
/// cross-context invocation pushes a fresh context whose return restores
/// the previous one.
#[derive(Debug)]
pub struct Context {
    applet: AppletId,
    current_package: PackageId,
    pub(crate) stack: Stack,
}

impl Context {
    /// A fresh context for `applet` entering `package`.
    pub fn new(applet: AppletId, package: PackageId) -> Self {
        Self {
            applet,
            current_package: package,
            stack: Stack::new(),
        }
    }

    /// The owning applet.
    pub fn applet(&self) -> AppletId {
        self.applet
    }

    /// The package of the currently executing method.
    pub fn current_package(&self) -> PackageId {
        self.current_package
    }

    /// Swap the current package on a cross-package call or return.
    pub fn set_current_package(&mut self, package: PackageId) {
        self.current_package = package;
    }

    /// The context's frame stack.
    pub fn stack(&self) -> &Stack {
        &self.stack
    }
}
