use std::sync::Arc;

use crate::error::Result;
use crate::model::ElementKind;

use super::code_stream::CodeStream;
use super::context::DecompilationContext;

/// A primary opcode handler. Returns whether it handled the instruction;
/// an unhandled opcode falls through to the next configuration in line.
pub type DecompilerDelegate =
    Arc<dyn Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<bool> + Send + Sync>;

/// A hook that runs before or after the primary handler of an opcode,
/// adjusting the context rather than consuming the instruction.
pub type DecompilerEnhancement =
    Arc<dyn Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Default,
    High,
}

type SelectorPredicate = Arc<dyn Fn(&DecompilationContext, u8) -> bool + Send + Sync>;

/// Decides whether a registered handler applies in the current
/// decompilation state.
#[derive(Clone)]
pub struct DecompilationStateSelector {
    predicate: Option<SelectorPredicate>,
}

impl DecompilationStateSelector {
    /// Selects in every state.
    pub fn all() -> Self {
        Self { predicate: None }
    }

    pub fn from_fn(
        predicate: impl Fn(&DecompilationContext, u8) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Selects when the expression on top of the operand stack is of the
    /// given kind.
    pub fn element_is_stacked(kind: ElementKind) -> Self {
        Self::from_fn(move |context, _| {
            context
                .peek()
                .map(|element| element.kind() == kind)
                .unwrap_or(false)
        })
    }

    pub fn and(self, other: DecompilationStateSelector) -> DecompilationStateSelector {
        match (self.predicate, other.predicate) {
            (None, None) => Self::all(),
            (Some(predicate), None) | (None, Some(predicate)) => Self {
                predicate: Some(predicate),
            },
            (Some(left), Some(right)) => Self {
                predicate: Some(Arc::new(move |context, opcode| {
                    left(context, opcode) && right(context, opcode)
                })),
            },
        }
    }

    pub(crate) fn select(&self, context: &DecompilationContext, opcode: u8) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(context, opcode),
            None => true,
        }
    }
}

struct DelegateAdapter<F> {
    priority: Priority,
    selector: DecompilationStateSelector,
    delegate: F,
}

type DelegateTable = [Option<Vec<DelegateAdapter<DecompilerDelegate>>>; 256];
type EnhancementTable = [Option<Vec<DelegateAdapter<DecompilerEnhancement>>>; 256];

/// An immutable registry of opcode handlers and enhancements. A decompiler
/// consults a user configuration first and its core configuration second,
/// so user registrations shadow the built-in behavior per opcode.
pub struct DecompilerConfiguration {
    delegates: DelegateTable,
    before: EnhancementTable,
    after: EnhancementTable,
}

impl DecompilerConfiguration {
    pub fn builder() -> DecompilerConfigurationBuilder {
        DecompilerConfigurationBuilder {
            delegates: std::array::from_fn(|_| None),
            before: std::array::from_fn(|_| None),
            after: std::array::from_fn(|_| None),
        }
    }

    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Combines two configurations. Within an opcode and priority, this
    /// configuration's handlers keep precedence over `other`'s.
    pub fn merge(self, other: DecompilerConfiguration) -> DecompilerConfiguration {
        fn merge_tables<F>(
            mut left: [Option<Vec<DelegateAdapter<F>>>; 256],
            right: [Option<Vec<DelegateAdapter<F>>>; 256],
        ) -> [Option<Vec<DelegateAdapter<F>>>; 256] {
            for (slot, incoming) in left.iter_mut().zip(right) {
                if let Some(mut incoming) = incoming {
                    match slot {
                        Some(existing) => {
                            existing.append(&mut incoming);
                            sort_by_priority(existing);
                        }
                        None => *slot = Some(incoming),
                    }
                }
            }
            left
        }

        DecompilerConfiguration {
            delegates: merge_tables(self.delegates, other.delegates),
            before: merge_tables(self.before, other.before),
            after: merge_tables(self.after, other.after),
        }
    }

    /// Runs the highest-priority applicable handler for `opcode`, if any.
    /// Returns whether the instruction was handled.
    pub(crate) fn try_decompile(
        &self,
        context: &mut DecompilationContext,
        stream: &mut CodeStream<'_>,
        opcode: u8,
    ) -> Result<bool> {
        if let Some(adapters) = &self.delegates[opcode as usize] {
            for adapter in adapters {
                if adapter.selector.select(context, opcode) {
                    return (adapter.delegate)(context, stream, opcode);
                }
            }
        }

        Ok(false)
    }

    pub(crate) fn apply_before(
        &self,
        context: &mut DecompilationContext,
        stream: &mut CodeStream<'_>,
        opcode: u8,
    ) -> Result<()> {
        Self::apply_enhancements(&self.before, context, stream, opcode)
    }

    pub(crate) fn apply_after(
        &self,
        context: &mut DecompilationContext,
        stream: &mut CodeStream<'_>,
        opcode: u8,
    ) -> Result<()> {
        Self::apply_enhancements(&self.after, context, stream, opcode)
    }

    fn apply_enhancements(
        table: &EnhancementTable,
        context: &mut DecompilationContext,
        stream: &mut CodeStream<'_>,
        opcode: u8,
    ) -> Result<()> {
        if let Some(adapters) = &table[opcode as usize] {
            for adapter in adapters {
                if adapter.selector.select(context, opcode) {
                    (adapter.delegate)(context, stream, opcode)?;
                }
            }
        }

        Ok(())
    }
}

impl Default for DecompilerConfiguration {
    fn default() -> Self {
        Self::empty()
    }
}

fn sort_by_priority<F>(adapters: &mut [DelegateAdapter<F>]) {
    adapters.sort_by_key(|adapter| std::cmp::Reverse(adapter.priority));
}

pub struct DecompilerConfigurationBuilder {
    delegates: DelegateTable,
    before: EnhancementTable,
    after: EnhancementTable,
}

impl DecompilerConfigurationBuilder {
    /// Registers a primary handler for a single opcode.
    pub fn on(&mut self, opcode: u8) -> DelegateBuilder<'_> {
        self.on_each(&[opcode])
    }

    /// Registers a primary handler for every opcode in `from..=to`.
    pub fn on_range(&mut self, from: u8, to: u8) -> DelegateBuilder<'_> {
        let opcodes: Vec<u8> = (from..=to).collect();
        DelegateBuilder {
            builder: self,
            opcodes,
            priority: Priority::Default,
            selector: DecompilationStateSelector::all(),
        }
    }

    /// Registers one primary handler shared by several opcodes.
    pub fn on_each(&mut self, opcodes: &[u8]) -> DelegateBuilder<'_> {
        DelegateBuilder {
            builder: self,
            opcodes: opcodes.to_vec(),
            priority: Priority::Default,
            selector: DecompilationStateSelector::all(),
        }
    }

    /// Registers an enhancement that runs before the primary handler of
    /// `opcode`.
    pub fn before(&mut self, opcode: u8) -> EnhancementBuilder<'_> {
        EnhancementBuilder {
            builder: self,
            opcode,
            priority: Priority::Default,
            selector: DecompilationStateSelector::all(),
            position: HookPosition::Before,
        }
    }

    /// Registers an enhancement that runs after the instruction has been
    /// decompiled.
    pub fn after(&mut self, opcode: u8) -> EnhancementBuilder<'_> {
        EnhancementBuilder {
            builder: self,
            opcode,
            priority: Priority::Default,
            selector: DecompilationStateSelector::all(),
            position: HookPosition::After,
        }
    }

    pub fn build(self) -> DecompilerConfiguration {
        let mut configuration = DecompilerConfiguration {
            delegates: self.delegates,
            before: self.before,
            after: self.after,
        };

        for slot in configuration.delegates.iter_mut().flatten() {
            sort_by_priority(slot);
        }
        for slot in configuration.before.iter_mut().flatten() {
            sort_by_priority(slot);
        }
        for slot in configuration.after.iter_mut().flatten() {
            sort_by_priority(slot);
        }

        configuration
    }
}

pub struct DelegateBuilder<'a> {
    builder: &'a mut DecompilerConfigurationBuilder,
    opcodes: Vec<u8>,
    priority: Priority,
    selector: DecompilationStateSelector,
}

impl DelegateBuilder<'_> {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn when(mut self, selector: DecompilationStateSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn then(
        self,
        delegate: impl Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<bool>
        + Send
        + Sync
        + 'static,
    ) {
        let delegate: DecompilerDelegate = Arc::new(delegate);

        for opcode in self.opcodes {
            self.builder.delegates[opcode as usize]
                .get_or_insert_with(Vec::new)
                .push(DelegateAdapter {
                    priority: self.priority,
                    selector: self.selector.clone(),
                    delegate: Arc::clone(&delegate),
                });
        }
    }
}

enum HookPosition {
    Before,
    After,
}

pub struct EnhancementBuilder<'a> {
    builder: &'a mut DecompilerConfigurationBuilder,
    opcode: u8,
    priority: Priority,
    selector: DecompilationStateSelector,
    position: HookPosition,
}

impl EnhancementBuilder<'_> {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn when(mut self, selector: DecompilationStateSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn then(
        self,
        enhancement: impl Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<()>
        + Send
        + Sync
        + 'static,
    ) {
        let table = match self.position {
            HookPosition::Before => &mut self.builder.before,
            HookPosition::After => &mut self.builder.after,
        };

        table[self.opcode as usize]
            .get_or_insert_with(Vec::new)
            .push(DelegateAdapter {
                priority: self.priority,
                selector: self.selector,
                delegate: Arc::new(enhancement),
            });
    }
}
