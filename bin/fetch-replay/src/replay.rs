use std::fmt;
use std::collections::HashMap;

use log::debug;
use fetchguard::fetchlog::{EnterEvent, ExitEvent, FetchEvent, TraceEvent};
use fetchguard::{Address, ContextId, Engine, FetchContext, SyscallNr, Verdict};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Summary {
    pub syscalls: u64,
    pub fetches: u64,
    pub skipped: u64,
    pub recorded: u64,
    pub consistent: u64,
    pub restored: u64,
    pub untracked: u64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "syscalls:   {}", self.syscalls)?;
        writeln!(f, "fetches:    {}", self.fetches)?;
        writeln!(f, "skipped:    {}", self.skipped)?;
        writeln!(f, "recorded:   {}", self.recorded)?;
        writeln!(f, "consistent: {}", self.consistent)?;
        writeln!(f, "restored:   {}", self.restored)?;
        write!(f, "untracked:  {}", self.untracked)
    }
}

/// A tampered fetch found while replaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Finding {
    pub context: u64,
    pub syscall: Option<SyscallNr>,
    pub address: u64,
    pub fetched: Vec<u8>,
    pub restored: Vec<u8>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let syscall = self.syscall
            .map_or_else(|| String::from("?"), |nr| nr.to_string());

        write!(
            f,
            "context {} syscall {} refetched {} bytes at {:#x}: {:02x?} restored to {:02x?}",
            self.context, syscall, self.fetched.len(), self.address, self.fetched, self.restored
        )
    }
}

/// Feeds trace events through an engine, one [`FetchContext`] per traced context.
pub(crate) struct Replayer {
    engine: Engine,
    contexts: HashMap<u64, FetchContext>,
    summary: Summary,
}

impl Replayer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            contexts: HashMap::new(),
            summary: Summary::default(),
        }
    }

    pub fn apply(&mut self, event: TraceEvent) -> Option<Finding> {
        match event {
            TraceEvent::Enter(EnterEvent { context, syscall }) => {
                self.summary.syscalls += 1;
                self.context(context).enter_syscall(SyscallNr(syscall));
                None
            },
            TraceEvent::Fetch(FetchEvent { context, address, bytes }) => self.fetch(context, address, bytes),
            TraceEvent::Exit(ExitEvent { context }) => {
                if let Some(state) = self.contexts.get_mut(&context) {
                    self.engine.clear(state);
                }
                None
            },
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    fn fetch(&mut self, context: u64, address: u64, bytes: Vec<u8>) -> Option<Finding> {
        self.summary.fetches += 1;

        let engine = &self.engine;
        let state = self.contexts
            .entry(context)
            .or_insert_with(|| engine.new_context(ContextId(context)));

        let mut to = bytes.clone();
        let verdict = engine.on_fetch(state, &mut to, Address::from(address as usize));
        debug!("Context {} fetch at {:#x}: {:?}", context, address, verdict);

        match verdict {
            Verdict::Skipped(_) => self.summary.skipped += 1,
            Verdict::Recorded => self.summary.recorded += 1,
            Verdict::Consistent => self.summary.consistent += 1,
            Verdict::Untracked => self.summary.untracked += 1,
            Verdict::Restored { .. } => {
                self.summary.restored += 1;
                return Some(Finding {
                    context,
                    syscall: state.current_syscall(),
                    address,
                    fetched: bytes,
                    restored: to,
                });
            },
        }

        None
    }

    fn context(&mut self, context: u64) -> &mut FetchContext {
        let engine = &self.engine;
        self.contexts
            .entry(context)
            .or_insert_with(|| engine.new_context(ContextId(context)))
    }
}
