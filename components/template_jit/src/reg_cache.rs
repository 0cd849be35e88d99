//! Register cache for the template encoder.
//!
//! Every template reads its operands from and writes its result to the
//! function's stack frame. The cache remembers which registers still hold a
//! copy of which frame slot so a later template can skip the reload.
//!
//! Invariant: an entry `reg -> (offset, kind)` means `reg` holds exactly the
//! value currently stored at `[ebp + offset]` read as `kind`. Templates keep
//! it true by invalidating a register before clobbering it and by calling
//! [`RegisterCache::overwrite_stack`] before every frame store.

use crate::registers::{Reg, RegClass, RegMask, ValueKind, NONVOLATILE_REGS};
use strum::IntoEnumIterator;

const REG_COUNT: usize = 16;

/// What a register holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Frame offset relative to `ebp`
    pub offset: i32,
    /// How the slot is read
    pub kind: ValueKind,
}

impl CacheEntry {
    fn overlaps(&self, offset: i32, width: i32) -> bool {
        self.offset < offset + width && offset < self.offset + self.kind.width()
    }
}

/// Per-function register cache.
#[derive(Debug, Clone)]
pub struct RegisterCache {
    entries: [Option<CacheEntry>; REG_COUNT],
    next_general: usize,
    next_xmm: usize,
}

impl Default for RegisterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            entries: [None; REG_COUNT],
            next_general: 0,
            next_xmm: 0,
        }
    }

    /// Forget everything and rewind the eviction cursors.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// What `reg` currently caches.
    pub fn entry(&self, reg: Reg) -> Option<CacheEntry> {
        self.entries[reg as usize]
    }

    /// All live entries.
    pub fn entries(&self) -> impl Iterator<Item = (Reg, CacheEntry)> + '_ {
        Reg::iter().filter_map(|reg| self.entry(reg).map(|entry| (reg, entry)))
    }

    /// Record that `reg` now mirrors the slot at `offset`.
    pub fn set_stack_info(&mut self, reg: Reg, offset: i32, kind: ValueKind) {
        assert_eq!(
            reg.class(),
            kind.class(),
            "{reg} cannot cache a {} value",
            <&'static str>::from(kind)
        );
        self.entries[reg as usize] = Some(CacheEntry { offset, kind });
    }

    /// Forget what `reg` holds.
    pub fn invalidate(&mut self, reg: Reg) {
        self.entries[reg as usize] = None;
    }

    /// Forget every register a call may clobber.
    pub fn invalidate_volatile(&mut self) {
        for reg in Reg::iter().filter(|reg| !NONVOLATILE_REGS.contains(*reg)) {
            self.invalidate(reg);
        }
    }

    /// Forget everything, e.g. at a join point.
    pub fn invalidate_all(&mut self) {
        self.entries = [None; REG_COUNT];
    }

    /// The frame bytes `[offset, offset + width)` are about to change.
    pub fn overwrite_stack(&mut self, offset: i32, width: i32) {
        for entry in self.entries.iter_mut() {
            if entry.is_some_and(|e| e.overlaps(offset, width)) {
                *entry = None;
            }
        }
    }

    /// A register outside `restriction` that mirrors `offset` as `kind`.
    pub fn find(&self, offset: i32, kind: ValueKind, restriction: RegMask) -> Option<Reg> {
        kind.class()
            .allocatable()
            .iter()
            .filter(|reg| !restriction.contains(*reg))
            .find(|reg| self.entry(*reg) == Some(CacheEntry { offset, kind }))
    }

    /// Pick a scratch register of `class` outside `restriction`.
    ///
    /// Empty registers are preferred; otherwise the class cursor evicts
    /// round-robin. The returned register is invalidated.
    pub fn alloc(&mut self, class: RegClass, restriction: RegMask) -> Reg {
        let candidates: Vec<Reg> = class
            .allocatable()
            .iter()
            .filter(|reg| !restriction.contains(*reg))
            .collect();
        assert!(
            !candidates.is_empty(),
            "no {class:?} register available outside {restriction:?}"
        );
        let reg = match candidates.iter().find(|reg| self.entry(**reg).is_none()) {
            Some(free) => *free,
            None => self.next_reg(class, &candidates),
        };
        self.invalidate(reg);
        reg
    }

    fn next_reg(&mut self, class: RegClass, candidates: &[Reg]) -> Reg {
        let all: Vec<Reg> = class.allocatable().iter().collect();
        let cursor = match class {
            RegClass::General => &mut self.next_general,
            RegClass::Xmm => &mut self.next_xmm,
        };
        loop {
            let reg = all[*cursor % all.len()];
            *cursor = (*cursor + 1) % all.len();
            if candidates.contains(&reg) {
                return reg;
            }
        }
    }
}
