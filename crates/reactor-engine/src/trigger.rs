//! Triggers: a compiled script plus the per-activation pipeline
//!
//! Every activation goes through the same stages regardless of the trigger's
//! kind: the cooldown gate, scope binding, then dispatch through the engine's
//! scheduler. Kinds only add metadata.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, RwLock};
use tracing::{trace, warn};

use crate::cooldown::CooldownTable;
use crate::engine::Core;
use crate::error::{BindError, CompileError, TriggerError, TriggerInitError, error_chain};
use crate::host::{ExceptionSink, Host, ItemLayout};
use crate::language::{Interpreter, Language};
use crate::scheduler::{Dispatch, Job};
use crate::script::ScriptUnit;
use crate::value::{EVENT_VAR, EventRef, Value, Vars};

/// Largest container a trigger may describe
pub const MAX_SLOTS: usize = 54;

/// Slots per container row
pub const ROW_SLOTS: usize = 9;

/// Kind-specific metadata carried next to the common trigger record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TriggerKind {
    #[default]
    Plain,
    Command {
        permissions: BTreeSet<String>,
        aliases: BTreeSet<String>,
    },
    Container {
        slots: usize,
        items: ItemLayout,
    },
}

impl TriggerKind {
    /// Command kind with no permissions and no aliases
    pub fn command() -> Self {
        TriggerKind::Command {
            permissions: BTreeSet::new(),
            aliases: BTreeSet::new(),
        }
    }

    /// Empty container kind, rejecting invalid sizes
    pub fn container(slots: usize) -> Result<Self, TriggerInitError> {
        validate_slots(slots)?;
        Ok(TriggerKind::Container {
            slots,
            items: ItemLayout::new(),
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::Plain => "Trigger",
            TriggerKind::Command { .. } => "Command",
            TriggerKind::Container { .. } => "Container",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, TriggerKind::Container { .. })
    }
}

/// A container size must be a whole number of rows, at least one, at most
/// [`MAX_SLOTS`]
pub fn validate_slots(slots: usize) -> Result<(), TriggerInitError> {
    if slots == 0 || slots % ROW_SLOTS != 0 || slots > MAX_SLOTS {
        return Err(TriggerInitError::InvalidSlots {
            slots,
            max: MAX_SLOTS,
        });
    }
    Ok(())
}

/// Detailed result of [`Trigger::try_activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The actor is on cooldown; nothing happened
    Refused,
    /// The engine is gone; the failure went to the sink
    BindFailed,
    Dispatched(Dispatch),
}

impl Activation {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Activation::Dispatched(_))
    }
}

pub struct Trigger<L: Language> {
    name: RwLock<String>,
    unit: RwLock<Arc<ScriptUnit<L>>>,
    cooldowns: CooldownTable,
    sync: AtomicBool,
    // Serializes forced-sync sections; reentrant so a sync run on the main
    // thread may force-sync its own trigger again
    sync_guard: ReentrantMutex<()>,
    kind: RwLock<TriggerKind>,
    core: Weak<Core<L>>,
    host: Arc<dyn Host>,
    sink: Arc<dyn ExceptionSink>,
}

impl<L: Language> Trigger<L> {
    pub(crate) fn new(
        core: &Arc<Core<L>>,
        name: impl Into<String>,
        source: impl Into<String>,
        kind: TriggerKind,
        location: Option<PathBuf>,
    ) -> Result<Self, TriggerInitError> {
        let name = name.into();

        if let TriggerKind::Container { slots, .. } = &kind {
            validate_slots(*slots)?;
        }

        let unit = ScriptUnit::compile(core.language(), name.clone(), source, location)
            .map_err(|source| TriggerInitError::Compile {
                trigger: name.clone(),
                source,
            })?;

        Ok(Self {
            name: RwLock::new(name),
            unit: RwLock::new(Arc::new(unit)),
            cooldowns: CooldownTable::new(),
            sync: AtomicBool::new(false),
            sync_guard: ReentrantMutex::new(()),
            kind: RwLock::new(kind),
            core: Arc::downgrade(core),
            host: core.host().clone(),
            sink: core.sink().clone(),
        })
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Change the trigger's name and rebuild its unit under the new name
    ///
    /// If the engine is gone or the rebuild fails, the running unit keeps its
    /// old name until the next successful edit.
    pub fn rename(&self, name: impl Into<String>) {
        let name = name.into();
        *self.name.write() = name.clone();

        let Some(core) = self.core.upgrade() else {
            return;
        };
        let current = self.unit();
        match current.recompile(core.language(), name.as_str(), current.source()) {
            Ok(next) => {
                let mut unit = self.unit.write();
                // An edit that landed meanwhile already carries the new name
                if Arc::ptr_eq(&*unit, &current) {
                    *unit = Arc::new(next);
                }
            }
            Err(err) => warn!(
                target: "trigger",
                "Trigger [{}] could not rebuild its script: {}",
                name,
                error_chain(&err)
            ),
        }
    }

    /// Current source text
    pub fn script(&self) -> String {
        self.unit.read().source().to_string()
    }

    /// The unit activations currently run
    pub fn unit(&self) -> Arc<ScriptUnit<L>> {
        self.unit.read().clone()
    }

    /// Replace the source text
    ///
    /// The new text is compiled first; on failure the trigger keeps running
    /// its previous unit. Activations already bound keep the unit they
    /// started with.
    pub fn set_script(&self, source: impl Into<String>) -> Result<(), CompileError> {
        let current = self.unit();
        let core = self.core.upgrade().ok_or_else(|| CompileError::Bind {
            script: current.name().to_string(),
            source: BindError::EngineGone,
        })?;

        let next = current.recompile(core.language(), self.name(), source)?;
        *self.unit.write() = Arc::new(next);
        Ok(())
    }

    pub fn is_sync(&self) -> bool {
        self.sync.load(Ordering::SeqCst)
    }

    pub fn set_sync(&self, sync: bool) {
        self.sync.store(sync, Ordering::SeqCst);
    }

    /// Run `f` with the sync flag forced to `sync`, restoring the previous
    /// value afterwards even if `f` panics
    ///
    /// Callers forcing the flag on the same trigger are serialized.
    pub fn with_sync<R>(&self, sync: bool, f: impl FnOnce() -> R) -> R {
        let _serial = self.sync_guard.lock();
        let previous = self.sync.swap(sync, Ordering::SeqCst);
        let _restore = RestoreSync {
            flag: &self.sync,
            previous,
        };
        f()
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind.read().clone()
    }

    pub fn set_kind(&self, kind: TriggerKind) -> Result<(), TriggerInitError> {
        if let TriggerKind::Container { slots, .. } = &kind {
            validate_slots(*slots)?;
        }
        *self.kind.write() = kind;
        Ok(())
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        match &*self.kind.read() {
            TriggerKind::Command { permissions, .. } => permissions.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn aliases(&self) -> BTreeSet<String> {
        match &*self.kind.read() {
            TriggerKind::Command { aliases, .. } => aliases.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Replace the permissions of a command trigger; false for other kinds
    pub fn set_permissions<I, S>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut *self.kind.write() {
            TriggerKind::Command { permissions, .. } => {
                *permissions = values.into_iter().map(Into::into).collect();
                true
            }
            _ => false,
        }
    }

    /// Replace the aliases of a command trigger; false for other kinds
    pub fn set_aliases<I, S>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match &mut *self.kind.write() {
            TriggerKind::Command { aliases, .. } => {
                *aliases = values.into_iter().map(Into::into).collect();
                true
            }
            _ => false,
        }
    }

    pub fn slots(&self) -> Option<usize> {
        match &*self.kind.read() {
            TriggerKind::Container { slots, .. } => Some(*slots),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<ItemLayout> {
        match &*self.kind.read() {
            TriggerKind::Container { items, .. } => Some(items.clone()),
            _ => None,
        }
    }

    /// Replace the stored layout of a container trigger; false for other kinds
    pub fn set_items(&self, layout: ItemLayout) -> bool {
        match &mut *self.kind.write() {
            TriggerKind::Container { items, .. } => {
                *items = layout;
                true
            }
            _ => false,
        }
    }

    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// `Kind.name`, used to label each run's span
    pub fn timing_id(&self) -> String {
        format!("{}.{}", self.kind.read().label(), self.name.read())
    }

    /// Activate against `event`; true once the run has been dispatched,
    /// whatever its eventual outcome
    pub fn activate(&self, event: EventRef, locals: Vars) -> bool {
        self.try_activate(event, locals).is_dispatched()
    }

    pub fn try_activate(&self, event: EventRef, locals: Vars) -> Activation {
        let name = self.name();

        if let Some(actor) = self.host.extract_actor(&*event) {
            if self.cooldowns.is_cooling_down(actor) {
                trace!(target: "trigger", "Trigger [{}] refused: {} is on cooldown", name, actor);
                return Activation::Refused;
            }
        }

        let Some(core) = self.core.upgrade() else {
            self.sink.handle(
                &event,
                TriggerError::Bind {
                    trigger: name,
                    source: BindError::EngineGone,
                },
            );
            return Activation::BindFailed;
        };

        let sync = self.is_sync();
        let unit = self.unit();

        // Lowest precedence first; later layers overwrite earlier ones
        let mut vars = Vars::new();
        vars.insert(EVENT_VAR.to_string(), Value::Event(event.clone()));
        vars.extend(core.shared_vars());
        if let Some(custom) = self.host.custom_vars(&*event) {
            vars.extend(custom);
        }
        vars.extend(locals);

        let mut interp = Interpreter::new(
            name.clone(),
            event.clone(),
            vars,
            core.extensions().clone(),
            sync,
            self.host.self_reference(),
        );
        let mut interrupter = self.host.make_interrupter(&event, &interp, &self.cooldowns);

        let language = core.language_handle();
        let job = Job::new(name, self.timing_id(), event, move || {
            language.run(unit.ast(), &mut interp, interrupter.as_mut())
        });

        Activation::Dispatched(core.scheduler().dispatch(job, sync))
    }

    /// An independent copy: same name, source and metadata, freshly compiled,
    /// with an empty cooldown table and async mode
    pub fn duplicate(&self) -> Result<Trigger<L>, CompileError> {
        let unit = self.unit();
        let core = self.core.upgrade().ok_or_else(|| CompileError::Bind {
            script: unit.name().to_string(),
            source: BindError::EngineGone,
        })?;

        let copy = ScriptUnit::compile(
            core.language(),
            self.name(),
            unit.source(),
            unit.location().map(Into::into),
        )?;

        Ok(Self {
            name: RwLock::new(self.name()),
            unit: RwLock::new(Arc::new(copy)),
            cooldowns: CooldownTable::new(),
            sync: AtomicBool::new(false),
            sync_guard: ReentrantMutex::new(()),
            kind: RwLock::new(self.kind()),
            core: self.core.clone(),
            host: self.host.clone(),
            sink: self.sink.clone(),
        })
    }
}

struct RestoreSync<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for RestoreSync<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl<L: Language> fmt::Display for Trigger<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.read();
        write!(
            f,
            "[{}={} sync={}]",
            kind.label(),
            self.name.read(),
            self.is_sync()
        )?;
        match &*kind {
            TriggerKind::Plain => Ok(()),
            TriggerKind::Command {
                permissions,
                aliases,
            } => write!(
                f,
                "{{permissions=[{}], aliases=[{}]}}",
                join(permissions),
                join(aliases)
            ),
            TriggerKind::Container { slots, items } => {
                write!(f, "{{slots={}, items={}}}", slots, items.len())
            }
        }
    }
}

impl<L: Language> fmt::Debug for Trigger<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
