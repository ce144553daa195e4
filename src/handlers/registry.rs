use std::collections::BTreeMap;
use std::sync::Arc;

use super::attributes::FileModifyAttributeHandler;
use super::commit::FileRenameHandler;
use super::delete::{ClearFolderHandler, FileDeleteHandler};
use super::duplicate::DuplicateHandler;
use super::envelope::FileEnvelopeByDirHandler;
use super::filter::{FileFilterHandler, FileSelectRangeHandler};
use super::rename::{CaseTransformHandler, FileNameReplaceByExpHandler};
use super::search::FileSearchHandler;
use super::traits::{Configurable, Handler};
use super::transfer::{FileCopyHandler, FileMoveHandler};
use crate::naming::NumberingTemplate;
use crate::params::{HandlerMetadata, ParameterSet, ValidationError};

/// Engine-wide settings handlers fall back to when a parameter is absent
#[derive(Debug, Clone, Default)]
pub struct HandlerDefaults {
    /// Numbering used by `FileCopyHandler` and as the `DuplicateHandler` base
    pub naming: NumberingTemplate,
}

type BuildFn = fn(&ParameterSet, &HandlerDefaults) -> Result<Arc<dyn Handler>, ValidationError>;

#[derive(Clone)]
struct Entry {
    metadata: HandlerMetadata,
    build: BuildFn,
}

fn build_boxed<H: Configurable>(
    params: &ParameterSet,
    defaults: &HandlerDefaults,
) -> Result<Arc<dyn Handler>, ValidationError> {
    Ok(Arc::new(H::from_params(params, defaults)?))
}

/// Registry mapping handler ids to their metadata and constructors
#[derive(Clone)]
pub struct HandlerRegistry {
    entries: BTreeMap<String, Entry>,
    defaults: HandlerDefaults,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new(defaults: HandlerDefaults) -> Self {
        Self {
            entries: BTreeMap::new(),
            defaults,
        }
    }

    pub fn register<H: Configurable>(&mut self) {
        let metadata = H::metadata();
        self.entries.insert(
            metadata.id.to_string(),
            Entry {
                metadata,
                build: build_boxed::<H>,
            },
        );
    }

    /// Validate `params` against the handler's schema and build it
    pub fn build(&self, id: &str, params: &ParameterSet) -> Result<Arc<dyn Handler>, ValidationError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ValidationError::UnknownHandler(id.to_string()))?;
        let validated = entry.metadata.validate(params)?;
        (entry.build)(&validated, &self.defaults)
    }

    pub fn metadata(&self, id: &str) -> Option<&HandlerMetadata> {
        self.entries.get(id).map(|entry| &entry.metadata)
    }

    /// Metadata of every registered handler, ordered by id
    pub fn list(&self) -> Vec<&HandlerMetadata> {
        self.entries.values().map(|entry| &entry.metadata).collect()
    }

    pub fn has_handler(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn defaults(&self) -> &HandlerDefaults {
        &self.defaults
    }

    /// Registry with every built-in handler
    pub fn with_defaults(defaults: HandlerDefaults) -> Self {
        let mut registry = Self::new(defaults);

        registry.register::<FileSearchHandler>();
        registry.register::<FileFilterHandler>();
        registry.register::<FileSelectRangeHandler>();
        registry.register::<FileNameReplaceByExpHandler>();
        registry.register::<CaseTransformHandler>();
        registry.register::<DuplicateHandler>();
        registry.register::<FileRenameHandler>();
        registry.register::<FileModifyAttributeHandler>();
        registry.register::<FileCopyHandler>();
        registry.register::<FileMoveHandler>();
        registry.register::<FileDeleteHandler>();
        registry.register::<FileEnvelopeByDirHandler>();
        registry.register::<ClearFolderHandler>();

        registry
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults(HandlerDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = HandlerRegistry::default();
        assert_eq!(registry.list().len(), 13);
        assert!(registry.has_handler("FileCopyHandler"));
        assert!(registry.has_handler("ClearFolderHandler"));
        assert!(!registry.has_handler("Pipe"));
    }

    #[test]
    fn test_build_validates_first() {
        let registry = HandlerRegistry::default();

        let err = registry
            .build("FileCopyHandler", &ParameterSet::new())
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::MissingParameter { .. }));

        let err = registry
            .build("FileCopyHandler", &ParameterSet::new().with("DestPath", "/tmp/out").with("Bogus", 1i64))
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::UnknownParameter { .. }));
    }

    #[test]
    fn test_unknown_handler() {
        let err = HandlerRegistry::default()
            .build("NoSuchHandler", &ParameterSet::new())
            .err()
            .unwrap();
        assert!(matches!(err, ValidationError::UnknownHandler(id) if id == "NoSuchHandler"));
    }

    #[test]
    fn test_build_describes_parameters() {
        let Ok(handler) = HandlerRegistry::default()
            .build("FileMoveHandler", &ParameterSet::new().with("DestPath", "/data/out"))
        else {
            panic!("FileMoveHandler should build");
        };
        assert_eq!(handler.name(), "FileMoveHandler");
        assert_eq!(handler.describe(), "FileMoveHandler(DestPath=/data/out, Overwrite=false)");
    }

    #[test]
    fn test_defaults_reach_copy_handler() {
        let defaults = HandlerDefaults {
            naming: NumberingTemplate::parse("_N").unwrap(),
        };
        let registry = HandlerRegistry::with_defaults(defaults);
        assert_eq!(registry.defaults().naming.pattern(), "_N");
        assert!(registry
            .build("FileCopyHandler", &ParameterSet::new().with("DestPath", "/tmp/out"))
            .is_ok());
    }
}
