//! In-memory host and domain fixtures for exercising converters.
//!
//! Models one kind, blocks, on both sides:
//! - [`HostRegistry`] plays the host engine's block registry;
//! - [`DomainCatalog`] plays the abstraction layer's declared blocks;
//! - [`BlockAdapter`] is the [`KindAdapter`] between them.
//!
//! Host blocks in the `minecraft` namespace get bare abstract ids
//! (`minecraft:air` becomes `air`).

use crate::adapter::KindAdapter;
use crate::converter::Converter;
use crate::error::AdapterError;
use crate::events::Declared;
use crate::guard::Unwrap;
use hostbridge_events::{EventBus, PublishOutcome};
use hostbridge_types::{MetaVariant, ObjectId, Payload};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const HOST_NAMESPACE: &str = "minecraft";

/// A block the host engine registered on its own.
#[derive(Debug)]
pub struct HostBlock {
    name: ObjectId,
    variants: bool,
    opaque: bool,
    payload: Payload,
}

impl HostBlock {
    pub fn new(name: ObjectId) -> Self {
        Self {
            name,
            variants: false,
            opaque: false,
            payload: Payload::new(),
        }
    }

    /// Marks the block as having meaningful sub-variants.
    pub fn with_variants(mut self) -> Self {
        self.variants = true;
        self
    }

    /// Makes the block impossible to introspect.
    pub fn opaque(mut self) -> Self {
        self.opaque = true;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &ObjectId {
        &self.name
    }
}

/// A host block the bridge created for a declared domain block.
#[derive(Debug)]
pub struct ForwardBlock {
    name: ObjectId,
    factory: BlockFactory,
}

impl ForwardBlock {
    pub fn factory(&self) -> &BlockFactory {
        &self.factory
    }
}

/// Native block handle. Compared by identity, like host object references.
#[derive(Debug, Clone)]
pub enum NativeBlock {
    Host(Arc<HostBlock>),
    Forward(Arc<ForwardBlock>),
}

impl NativeBlock {
    pub fn name(&self) -> &ObjectId {
        match self {
            Self::Host(block) => &block.name,
            Self::Forward(block) => &block.name,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward(_))
    }

    fn address(&self) -> usize {
        match self {
            Self::Host(block) => Arc::as_ptr(block) as usize,
            Self::Forward(block) => Arc::as_ptr(block) as usize,
        }
    }
}

impl PartialEq for NativeBlock {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for NativeBlock {}

impl Hash for NativeBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl Unwrap<BlockFactory> for NativeBlock {
    fn unwrap_counterpart(&self) -> Option<BlockFactory> {
        match self {
            Self::Forward(block) => Some(block.factory.clone()),
            Self::Host(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FactoryOrigin {
    /// Declared by the abstraction layer.
    Declared,
    /// Built around a host block that existed first.
    Backward(NativeBlock),
}

/// Abstract block handle. Compared by id.
#[derive(Debug, Clone)]
pub struct BlockFactory {
    id: ObjectId,
    origin: FactoryOrigin,
    payload: Payload,
}

impl BlockFactory {
    pub fn declared(id: ObjectId) -> Self {
        Self {
            id,
            origin: FactoryOrigin::Declared,
            payload: Payload::new(),
        }
    }

    pub fn backward(id: ObjectId, native: NativeBlock) -> Self {
        Self {
            id,
            origin: FactoryOrigin::Backward(native),
            payload: Payload::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn origin(&self) -> &FactoryOrigin {
        &self.origin
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_backward(&self) -> bool {
        matches!(self.origin, FactoryOrigin::Backward(_))
    }
}

impl PartialEq for BlockFactory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BlockFactory {}

impl Hash for BlockFactory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Unwrap<NativeBlock> for BlockFactory {
    fn unwrap_counterpart(&self) -> Option<NativeBlock> {
        match &self.origin {
            FactoryOrigin::Backward(native) => Some(native.clone()),
            FactoryOrigin::Declared => None,
        }
    }
}

/// The host engine's block registry.
#[derive(Debug, Default)]
pub struct HostRegistry {
    blocks: RwLock<Vec<NativeBlock>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host-owned block and returns its handle.
    pub fn add(&self, block: HostBlock) -> NativeBlock {
        let native = NativeBlock::Host(Arc::new(block));
        self.blocks.write().push(native.clone());
        native
    }

    pub fn insert(&self, native: NativeBlock) {
        self.blocks.write().push(native);
    }

    pub fn all(&self) -> Vec<NativeBlock> {
        self.blocks.read().clone()
    }

    pub fn find(&self, name: &ObjectId) -> Option<NativeBlock> {
        self.blocks
            .read()
            .iter()
            .find(|block| block.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

/// The abstraction layer's block catalog.
#[derive(Debug, Default)]
pub struct DomainCatalog {
    declared: RwLock<Vec<BlockFactory>>,
    adopted: RwLock<Vec<BlockFactory>>,
}

impl DomainCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&self, factory: BlockFactory) {
        self.declared.write().push(factory);
    }

    /// Declares `factory` after bulk registration closed, announcing it on `events`.
    pub fn declare_and_publish(&self, factory: BlockFactory, events: &EventBus) -> PublishOutcome {
        self.declare(factory.clone());
        events.publish(Declared::new(factory))
    }

    pub fn declared(&self) -> Vec<BlockFactory> {
        self.declared.read().clone()
    }

    /// Factories created from host blocks, in mapping order.
    pub fn adopted(&self) -> Vec<BlockFactory> {
        self.adopted.read().clone()
    }

    fn adopt(&self, factory: BlockFactory) {
        self.adopted.write().push(factory);
    }
}

pub struct BlockAdapter {
    host: Arc<HostRegistry>,
    domain: Arc<DomainCatalog>,
    refused: RwLock<HashSet<ObjectId>>,
    stages: RwLock<Vec<String>>,
}

impl BlockAdapter {
    pub fn new(host: Arc<HostRegistry>, domain: Arc<DomainCatalog>) -> Self {
        Self {
            host,
            domain,
            refused: RwLock::new(HashSet::new()),
            stages: RwLock::new(Vec::new()),
        }
    }

    /// Makes the host refuse to create a native block for `id`.
    pub fn refuse(&self, id: ObjectId) {
        self.refused.write().insert(id);
    }

    /// Runtime stages this adapter took part in, in order.
    pub fn stages(&self) -> Vec<String> {
        self.stages.read().clone()
    }

    fn abstract_id_for(&self, block: &HostBlock, variant: MetaVariant) -> Result<ObjectId, AdapterError> {
        let base = match block.name.namespace() {
            Some(HOST_NAMESPACE) => block.name.path().to_string(),
            _ => block.name.to_string(),
        };
        let id = if variant.is_default() {
            base
        } else {
            format!("{base}_{variant}")
        };
        ObjectId::parse(&id).map_err(|err| AdapterError::Other(err.into()))
    }
}

impl KindAdapter for BlockAdapter {
    type Abstract = BlockFactory;
    type Native = NativeBlock;

    const KIND: &'static str = "block";

    fn abstract_id(&self, object: &BlockFactory) -> ObjectId {
        object.id.clone()
    }

    fn declared(&self) -> Vec<BlockFactory> {
        self.domain.declared()
    }

    fn build_abstract(
        &self,
        native: &NativeBlock,
        variant: MetaVariant,
        payload: Payload,
    ) -> Result<BlockFactory, AdapterError> {
        match native {
            NativeBlock::Host(block) if block.opaque => Err(AdapterError::unsupported(
                "host block exposes no properties",
            )),
            NativeBlock::Host(block) => {
                let id = self.abstract_id_for(block, variant)?;
                Ok(BlockFactory::backward(id, native.clone()).with_payload(payload))
            }
            NativeBlock::Forward(_) => Err(AdapterError::unsupported(
                "forward blocks are converted through their factory",
            )),
        }
    }

    fn on_mapped(&self, object: &BlockFactory) {
        self.domain.adopt(object.clone());
    }

    fn save(&self, object: &BlockFactory) -> Payload {
        object.payload.clone()
    }

    fn on_stage(&self, stage: &str) -> Result<(), AdapterError> {
        self.stages.write().push(stage.to_string());
        Ok(())
    }

    fn native_registry(&self) -> Vec<NativeBlock> {
        self.host.all()
    }

    fn native_name(&self, native: &NativeBlock) -> String {
        native.name().to_string()
    }

    fn construct_native(
        &self,
        object: &BlockFactory,
        id: &ObjectId,
    ) -> Result<NativeBlock, AdapterError> {
        if self.refused.read().contains(&object.id) {
            return Err(anyhow::anyhow!("host refused to register block '{id}'").into());
        }
        let native = NativeBlock::Forward(Arc::new(ForwardBlock {
            name: id.clone(),
            factory: object.clone(),
        }));
        self.host.insert(native.clone());
        Ok(native)
    }

    fn read_payload(&self, native: &NativeBlock) -> Payload {
        match native {
            NativeBlock::Host(block) => block.payload.clone(),
            NativeBlock::Forward(_) => Payload::new(),
        }
    }

    fn find_native(&self, id: &ObjectId) -> Option<NativeBlock> {
        self.host.find(id)
    }

    fn supports_variants(&self, native: &NativeBlock) -> bool {
        match native {
            NativeBlock::Host(block) => block.variants,
            NativeBlock::Forward(_) => false,
        }
    }
}

/// A host registry and domain catalog wired to one block adapter.
#[derive(Debug, Default, Clone)]
pub struct BlockWorld {
    pub host: Arc<HostRegistry>,
    pub domain: Arc<DomainCatalog>,
}

impl BlockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter(&self) -> BlockAdapter {
        BlockAdapter::new(Arc::clone(&self.host), Arc::clone(&self.domain))
    }

    pub fn converter(&self) -> Converter<BlockAdapter> {
        Converter::new(self.adapter())
    }
}
