//! One synchronized module: the local mirror and the rules for reading a
//! store document into it and writing it back out.
//!
//! [`ModuleSync<T>`] is generic over the payload type; the coordinator holds
//! the nine instances behind the object-safe [`ModuleSlot`] trait so the
//! same protocol runs uniformly over differently typed documents.

use std::any::Any;

use serde_json::Value;
use tokio::sync::watch;

use capkit_core::document::{self, Document, MergeStrategy, Shape};
use capkit_core::{ModuleData, ModuleName};

use crate::error::SyncError;

/// A local change submitted through a module handle.
pub(crate) enum ModuleEdit {
    /// Full replacement value; boxed `T`.
    Replace(Box<dyn Any + Send>),
    /// In-place edit applied to the current value; receives `&mut T`.
    Update(Box<dyn FnOnce(&mut dyn Any) + Send>),
}

pub(crate) trait ModuleSlot: Send {
    fn module(&self) -> ModuleName;

    fn apply_local(&mut self, edit: ModuleEdit) -> Result<(), SyncError>;

    /// Replace the mirror from an existing store document.
    fn apply_remote(&mut self, document: Document) -> Result<(), SyncError>;

    /// Back to the static initial value.
    fn reset(&mut self);

    /// Sanitized, store-shaped form of the current mirror.
    fn write_payload(&self) -> Result<Document, SyncError>;
}

pub struct ModuleSync<T: ModuleData> {
    module: ModuleName,
    initial: T,
    initial_json: Value,
    shape: Shape,
    strategy: MergeStrategy,
    mirror: watch::Sender<T>,
}

impl<T: ModuleData> ModuleSync<T> {
    /// Returns the sync unit and a receiver observing its mirror.
    pub fn new(
        module: ModuleName,
        initial: T,
        strategy: MergeStrategy,
    ) -> Result<(Self, watch::Receiver<T>), SyncError> {
        let initial_json = document::sanitize(&initial)?;
        let shape = Shape::of(&initial_json);
        let (mirror, rx) = watch::channel(initial.clone());
        Ok((
            Self {
                module,
                initial,
                initial_json,
                shape,
                strategy,
                mirror,
            },
            rx,
        ))
    }

    /// Instance configured from `T`'s [`ModuleData`] constants.
    pub fn for_data() -> Result<(Self, watch::Receiver<T>), SyncError> {
        Self::new(T::MODULE, T::initial(), T::MERGE)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn current(&self) -> T {
        self.mirror.borrow().clone()
    }

    /// Decode a store document through this module's read path: unwrap,
    /// merge with the initial value, deserialize.
    pub fn decode(&self, stored: Document) -> Result<T, SyncError> {
        let Some(value) = document::unwrap(stored, self.shape) else {
            return Ok(self.initial.clone());
        };
        let merged = self.strategy.apply(&self.initial_json, value);
        Ok(serde_json::from_value(merged)?)
    }

    /// Encode a value through this module's write path.
    pub fn encode(value: &T) -> Result<Document, SyncError> {
        Ok(document::wrap(document::sanitize(value)?))
    }
}

impl<T: ModuleData> ModuleSlot for ModuleSync<T> {
    fn module(&self) -> ModuleName {
        self.module
    }

    fn apply_local(&mut self, edit: ModuleEdit) -> Result<(), SyncError> {
        let value = match edit {
            ModuleEdit::Replace(value) => *value
                .downcast::<T>()
                .map_err(|_| SyncError::ModuleType {
                    module: self.module,
                })?,
            ModuleEdit::Update(apply) => {
                let mut value = self.current();
                apply(&mut value);
                value
            }
        };
        self.mirror.send_replace(value);
        Ok(())
    }

    fn apply_remote(&mut self, document: Document) -> Result<(), SyncError> {
        let value = self.decode(document)?;
        self.mirror.send_replace(value);
        Ok(())
    }

    fn reset(&mut self) {
        self.mirror.send_replace(self.initial.clone());
    }

    fn write_payload(&self) -> Result<Document, SyncError> {
        Self::encode(&self.mirror.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capkit_core::modules::Checklists;
    use capkit_core::{Canvas, Grow, Persona, Personas};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn remote_document_replaces_mirror() {
        let (mut sync, rx) = ModuleSync::<Canvas>::for_data().expect("sync");
        sync.apply_remote(doc(json!({"Problem": "Z"}))).expect("apply");
        assert_eq!(rx.borrow().section("Problem"), Some("Z"));
        assert_eq!(rx.borrow().0.len(), 1);
    }

    #[test]
    fn undecodable_remote_document_leaves_mirror_untouched() {
        let (mut sync, rx) = ModuleSync::<Canvas>::for_data().expect("sync");
        let err = sync
            .apply_remote(doc(json!({"Problem": {"nested": true}})))
            .unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
        assert_eq!(*rx.borrow(), Canvas::initial());
    }

    #[test]
    fn grow_fills_missing_substructures() {
        let (mut sync, rx) = ModuleSync::<Grow>::for_data().expect("sync");
        sync.apply_remote(doc(json!({"legal": {"businessStructure": "LLC"}})))
            .expect("apply");
        assert_eq!(rx.borrow().legal.business_structure, "LLC");
        assert_eq!(rx.borrow().checklists, Checklists::default());
    }

    #[test]
    fn personas_write_wrapped_and_read_back() {
        let (mut sync, _rx) = ModuleSync::<Personas>::for_data().expect("sync");
        assert_eq!(sync.shape(), Shape::Wrapped);

        let personas = Personas(vec![Persona {
            id: "p1".into(),
            name: "Ana".into(),
            ..Persona::default()
        }]);
        sync.apply_local(ModuleEdit::Replace(Box::new(personas.clone())))
            .expect("apply");

        let payload = sync.write_payload().expect("payload");
        assert!(payload["data"].is_array());
        assert_eq!(sync.decode(payload).expect("decode"), personas);
    }

    #[test]
    fn wrapped_document_without_data_decodes_to_initial() {
        let (sync, _rx) = ModuleSync::<Personas>::for_data().expect("sync");
        assert_eq!(sync.decode(Document::new()).expect("decode"), Personas::initial());
    }

    #[test]
    fn replace_with_wrong_type_is_rejected() {
        let (mut sync, _rx) = ModuleSync::<Canvas>::for_data().expect("sync");
        let err = sync
            .apply_local(ModuleEdit::Replace(Box::new(Personas::initial())))
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::ModuleType {
                module: ModuleName::Canvas
            }
        ));
    }

    #[test]
    fn update_edits_current_value_and_reset_restores_initial() {
        let (mut sync, rx) = ModuleSync::<Canvas>::for_data().expect("sync");
        sync.apply_local(ModuleEdit::Update(Box::new(|any: &mut dyn Any| {
            if let Some(canvas) = any.downcast_mut::<Canvas>() {
                canvas.set_section("Problem", "X");
            }
        })))
        .expect("apply");
        assert_eq!(rx.borrow().section("Problem"), Some("X"));
        assert_eq!(rx.borrow().section("Solution"), Some(""));

        sync.reset();
        assert_eq!(*rx.borrow(), Canvas::initial());
    }
}
