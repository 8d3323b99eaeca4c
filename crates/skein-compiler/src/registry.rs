//! Destinations for generated classes.
//!
//! The runtime class loader receives every class a unit produces, markers
//! before the primary class. [`ClassSink`] is that seam; [`ClassRegistry`]
//! is an in-memory sink that can be shared between compiling threads.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use skein_ast::AstBuilder;
//! use skein_compiler::{ClassRegistry, Compiler, SourceUnit};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let script = b.script(&[], &[b.stmt(b.number("1"))]);
//! let unit = Compiler::default().compile(&script, &SourceUnit::new("st.app", "One")).unwrap();
//!
//! let registry = ClassRegistry::new();
//! assert_eq!(unit.define_in(&registry), 1);
//! assert!(registry.contains("st.app.One"));
//! ```

use log::{debug, warn};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::unit::GeneratedClass;

/// Something that accepts generated classes.
pub trait ClassSink {
    /// Define `class`, returning `false` if it was refused.
    fn define(&self, class: &GeneratedClass) -> bool;
}

/// Class bytes by dotted name. A name can be defined once.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the class named `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.classes.read().get(name).cloned()
    }

    /// Whether `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Number of defined classes.
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Whether nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Define every class in `classes` under one lock, or none of them.
    ///
    /// Returns the first name that is already defined, or repeated within
    /// the batch, if the batch was refused.
    pub fn define_all<'c>(&self, classes: impl IntoIterator<Item = &'c GeneratedClass>) -> Result<usize, String> {
        let batch: Vec<&GeneratedClass> = classes.into_iter().collect();
        let mut classes = self.classes.write();
        let mut seen = FxHashSet::default();
        for class in &batch {
            if classes.contains_key(&class.name) || !seen.insert(class.name.as_str()) {
                warn!("class {} is already defined, refusing its batch", class.name);
                return Err(class.name.clone());
            }
        }
        for class in &batch {
            debug!("defining {} ({} bytes)", class.name, class.bytes.len());
            classes.insert(class.name.clone(), class.bytes.clone());
        }
        Ok(batch.len())
    }

    /// Defined names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ClassSink for ClassRegistry {
    fn define(&self, class: &GeneratedClass) -> bool {
        let mut classes = self.classes.write();
        if classes.contains_key(&class.name) {
            warn!("class {} is already defined", class.name);
            return false;
        }
        debug!("defining {} ({} bytes)", class.name, class.bytes.len());
        classes.insert(class.name.clone(), class.bytes.clone());
        true
    }
}
