use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::hash::Hash;
use std::path::{Component, PathBuf};

use indexmap::IndexMap;

use crate::activation::Activation;
use crate::condition::ConditionEvaluator;
use crate::error::{Error, Result};
use crate::event::EventKind;

/// Target a breakpoint fires on, decided once at creation time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BreakTarget<C> {
    /// A source position.
    Line {
        /// Canonical source file.
        file: String,
        /// Line number within the file.
        line: u32,
    },

    /// Entry into a code unit.
    Code {
        /// Identity of the code unit.
        code: C,
        /// First executable line, captured on the first observation of a
        /// fresh activation of this code and reused for every later entry
        /// (recursive or looped re-entries all match).
        first_line: Option<u32>,
    },
}

/// A user-declared stop request: a location plus optional guard condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakpoint<C> {
    number: u32,
    target: BreakTarget<C>,
    offset: Option<u32>,
    condition: Option<String>,
    enabled: bool,
    temporary: bool,
    hit_count: u64,
    ignore_count: u64,
}

impl<C> Breakpoint<C> {
    /// Permanent number of this breakpoint.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Target this breakpoint fires on.
    #[must_use]
    pub fn target(&self) -> &BreakTarget<C> {
        &self.target
    }

    /// Code offset for offset-precision stops, if any.
    #[must_use]
    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    /// Guard expression, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Whether the breakpoint currently fires.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the breakpoint deletes itself after its first effective hit.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Number of times an activation reached this breakpoint while enabled.
    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Number of effective hits still to be passed silently.
    #[must_use]
    pub fn ignore_count(&self) -> u64 {
        self.ignore_count
    }
}

impl<C: fmt::Debug> Breakpoint<C> {
    /// Renders the one-line listing entry plus its optional trailing lines.
    fn format(&self) -> String {
        let disp = if self.temporary { "del" } else { "keep" };
        let state = if self.enabled { "yes" } else { "no" };

        let mut out = String::new();

        match &self.target {
            BreakTarget::Line { file, line } => {
                let _ = write!(
                    out,
                    "{} breakpoint {disp} {state} {} at {file}:{line}",
                    self.number,
                    OffsetColumn(self.offset),
                );
            }
            BreakTarget::Code { code, first_line } => {
                let _ = write!(
                    out,
                    "{} breakpoint {disp} {state} {} at {code:?}:{}",
                    self.number,
                    OffsetColumn(self.offset),
                    first_line.unwrap_or(0),
                );
            }
        }

        if let Some(cond) = &self.condition {
            let _ = write!(out, "\n\tstop only if {cond}");
        }

        if self.ignore_count > 0 {
            let _ = write!(out, "\n\tignore next {} hits", self.ignore_count);
        }

        if self.hit_count > 0 {
            let plural = if self.hit_count > 1 { "s" } else { "" };
            let _ = write!(
                out,
                "\n\tbreakpoint already hit {} time{plural}",
                self.hit_count
            );
        }

        out
    }
}

struct OffsetColumn(Option<u32>);

impl fmt::Display for OffsetColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(offset) => write!(f, "{offset}"),
            None => f.write_str("-"),
        }
    }
}

/// Resolved location and flags a breakpoint is created from.
///
/// Produced by the surrounding application's location resolver; the registry
/// never sees raw user text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BreakpointSpec<C> {
    /// Source file of a line target.
    pub file: Option<String>,

    /// Line number of a line target.
    pub line: Option<u32>,

    /// Code identity of a call target.
    pub code: Option<C>,

    /// Code offset for offset-precision stops.
    pub offset: Option<u32>,

    /// Optional guard expression.
    pub condition: Option<String>,

    /// Whether the breakpoint deletes itself after its first effective hit.
    pub temporary: bool,
}

impl<C> BreakpointSpec<C> {
    /// Creates a spec for a plain line breakpoint.
    pub fn at_line(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            code: None,
            offset: None,
            condition: None,
            temporary: false,
        }
    }

    /// Creates a spec for a code-entry breakpoint.
    pub fn at_code(code: C) -> Self {
        Self {
            file: None,
            line: None,
            code: Some(code),
            offset: None,
            condition: None,
            temporary: false,
        }
    }

    /// Attaches a guard expression.
    #[must_use]
    pub fn with_condition(mut self, expr: impl Into<String>) -> Self {
        self.condition = Some(expr.into());
        self
    }

    /// Marks the breakpoint as temporary.
    #[must_use]
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Requests an offset-precision stop.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Outcome of a successful breakpoint match.
#[derive(Clone, Debug)]
pub struct BreakpointHit {
    /// Number of the matched breakpoint.
    pub number: u32,

    /// Whether the matched breakpoint was temporary.
    pub temporary: bool,

    /// Whether the hit may auto-delete a temporary breakpoint.
    ///
    /// `false` when the guard condition failed to evaluate: the stop still
    /// happens, but the breakpoint is kept so the broken condition can be
    /// inspected.
    pub auto_delete: bool,

    /// Rendering of the guard-evaluation failure, if one occurred.
    pub condition_error: Option<String>,
}

/// Stores, indexes and matches breakpoints.
///
/// Numbers are handed out monotonically and never reused: deleting a
/// breakpoint nulls its slot, it never shrinks the slot array.
pub struct BreakpointRegistry<C> {
    slots: Vec<Option<Breakpoint<C>>>,

    /// (canonical file, line) -> breakpoint numbers, in insertion order.
    by_line: IndexMap<(String, u32), Vec<u32>>,

    /// Code identity -> breakpoint numbers, in insertion order.
    by_code: IndexMap<C, Vec<u32>>,

    /// Canonical-file cache.
    canonic: HashMap<String, String>,
}

impl<C> Default for BreakpointRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> BreakpointRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            by_line: IndexMap::new(),
            by_code: IndexMap::new(),
            canonic: HashMap::new(),
        }
    }

    /// Canonicalizes a file name, caching the result.
    ///
    /// Pseudo-files of the `<input>` form are kept verbatim; everything else
    /// is lexically normalized so that equivalent spellings of one path
    /// index the same bucket.
    pub fn canonic(&mut self, file: &str) -> String {
        if file.starts_with('<') && file.ends_with('>') {
            return file.to_owned();
        }

        self.canonic
            .entry(file.to_owned())
            .or_insert_with(|| normalize_path(file))
            .clone()
    }

    fn slot(&self, number: u32) -> Result<&Option<Breakpoint<C>>> {
        usize::try_from(number)
            .ok()
            .filter(|n| *n >= 1)
            .and_then(|n| self.slots.get(n - 1))
            .ok_or(Error::NotFound(number))
    }

    /// Looks up a breakpoint by number.
    pub fn get(&self, number: u32) -> Result<&Breakpoint<C>> {
        self.slot(number)?
            .as_ref()
            .ok_or(Error::AlreadyDeleted(number))
    }

    fn get_mut(&mut self, number: u32) -> Result<&mut Breakpoint<C>> {
        usize::try_from(number)
            .ok()
            .filter(|n| *n >= 1)
            .and_then(|n| self.slots.get_mut(n - 1))
            .ok_or(Error::NotFound(number))?
            .as_mut()
            .ok_or(Error::AlreadyDeleted(number))
    }

    /// Numbers of all live breakpoints, ascending.
    #[must_use]
    pub fn numbers(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(Breakpoint::number))
            .collect()
    }

    /// Enables the breakpoint with the given number.
    pub fn enable(&mut self, number: u32) -> Result<()> {
        self.get_mut(number)?.enabled = true;
        Ok(())
    }

    /// Disables the breakpoint with the given number.
    pub fn disable(&mut self, number: u32) -> Result<()> {
        self.get_mut(number)?.enabled = false;
        Ok(())
    }

    /// Enables every live breakpoint.
    pub fn enable_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.enabled = true;
        }
    }

    /// Disables every live breakpoint.
    pub fn disable_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.enabled = false;
        }
    }

    /// Replaces (or clears) the guard expression of a breakpoint.
    pub fn set_condition(&mut self, number: u32, condition: Option<String>) -> Result<()> {
        self.get_mut(number)?.condition = condition;
        Ok(())
    }

    /// Sets the number of effective hits to pass silently.
    pub fn set_ignore(&mut self, number: u32, count: u64) -> Result<()> {
        self.get_mut(number)?.ignore_count = count;
        Ok(())
    }

    /// Renders the listing entry of one breakpoint.
    pub fn format(&self, number: u32) -> Result<String>
    where
        C: fmt::Debug,
    {
        self.get(number).map(Breakpoint::format)
    }

    /// Renders the listing entries of every live breakpoint.
    #[must_use]
    pub fn format_all(&self) -> Vec<String>
    where
        C: fmt::Debug,
    {
        self.slots
            .iter()
            .flatten()
            .map(Breakpoint::format)
            .collect()
    }
}

impl<C: Clone + Eq + Hash> BreakpointRegistry<C> {
    /// Registers a new breakpoint and returns its permanent number.
    ///
    /// The spec must carry either a code identity or a file/line pair;
    /// anything else is rejected atomically with
    /// [`InvalidLocation`](Error::InvalidLocation) and nothing is
    /// registered. An explicit code identity wins over a file/line pair.
    pub fn add(&mut self, spec: BreakpointSpec<C>) -> Result<u32> {
        let number = u32::try_from(self.slots.len() + 1).map_err(|_| Error::InvalidLocation)?;

        let target = if let Some(code) = spec.code {
            self.by_code.entry(code.clone()).or_default().push(number);

            BreakTarget::Code {
                code,
                first_line: spec.line,
            }
        } else if let (Some(file), Some(line)) = (spec.file, spec.line) {
            let file = self.canonic(&file);

            self.by_line
                .entry((file.clone(), line))
                .or_default()
                .push(number);

            BreakTarget::Line { file, line }
        } else {
            return Err(Error::InvalidLocation);
        };

        self.slots.push(Some(Breakpoint {
            number,
            target,
            offset: spec.offset,
            condition: spec.condition,
            enabled: true,
            temporary: spec.temporary,
            hit_count: 0,
            ignore_count: 0,
        }));

        Ok(number)
    }

    /// Deletes the breakpoint with the given number.
    ///
    /// The slot is nulled, never reused; deleting an already-deleted number
    /// reports [`AlreadyDeleted`](Error::AlreadyDeleted).
    pub fn delete(&mut self, number: u32) -> Result<()> {
        if self.slot(number)?.is_none() {
            return Err(Error::AlreadyDeleted(number));
        }

        let removed = self.slots[number as usize - 1].take();

        if let Some(breakpoint) = removed {
            self.prune_index(&breakpoint);
        }

        Ok(())
    }

    /// Deletes every breakpoint at the given source position and returns
    /// their numbers.
    ///
    /// An unknown position is not an error; the returned list is empty.
    pub fn delete_by_line(&mut self, file: &str, line: u32) -> Vec<u32> {
        let key = (self.canonic(file), line);

        let Some(numbers) = self.by_line.shift_remove(&key) else {
            return Vec::new();
        };

        for number in &numbers {
            self.slots[*number as usize - 1] = None;
        }

        numbers
    }

    /// Deletes every breakpoint.
    ///
    /// Numbering is permanent: breakpoints added afterwards keep counting
    /// from where it left off.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }

        self.by_line.clear();
        self.by_code.clear();
    }

    fn prune_index(&mut self, breakpoint: &Breakpoint<C>) {
        let number = breakpoint.number;

        match &breakpoint.target {
            BreakTarget::Line { file, line } => {
                let key = (file.clone(), *line);

                if let Some(numbers) = self.by_line.get_mut(&key) {
                    numbers.retain(|n| *n != number);

                    if numbers.is_empty() {
                        self.by_line.shift_remove(&key);
                    }
                }
            }
            BreakTarget::Code { code, .. } => {
                if let Some(numbers) = self.by_code.get_mut(code) {
                    numbers.retain(|n| *n != number);

                    if numbers.is_empty() {
                        self.by_code.shift_remove(code);
                    }
                }
            }
        }
    }

    /// Event kinds worth instrumenting in the given file, judged from the
    /// enabled line breakpoints registered there.
    pub fn interest_in_file(&mut self, file: &str) -> crate::event::EventMask {
        use crate::event::EventMask;

        let file = self.canonic(file);
        let mut mask = EventMask::empty();

        for ((bp_file, _), numbers) in &self.by_line {
            if *bp_file != file {
                continue;
            }

            for number in numbers {
                let Some(breakpoint) = self.slots[*number as usize - 1]
                    .as_ref()
                    .filter(|bp| bp.enabled)
                else {
                    continue;
                };

                mask |= EventMask::LINE;

                if breakpoint.offset.is_some() {
                    mask |= EventMask::INSTRUCTION;
                }
            }
        }

        mask
    }

    /// Returns whether an enabled breakpoint targets the given code unit.
    #[must_use]
    pub fn has_code_target(&self, code: &C) -> bool {
        self.by_code.get(code).is_some_and(|numbers| {
            numbers.iter().any(|number| {
                self.slots[*number as usize - 1]
                    .as_ref()
                    .is_some_and(|bp| bp.enabled)
            })
        })
    }

    /// Scans the breakpoints matching the given event and performs hit
    /// accounting on them.
    ///
    /// Candidates are visited in insertion order. Every enabled candidate
    /// passing the identity guard counts a hit; ignore counts are consumed
    /// only on hits whose condition (if any) evaluated true. A condition
    /// that fails to evaluate matches anyway (a broken guard must never let
    /// execution slip past the very point being inspected) but refuses the
    /// temporary auto-delete.
    ///
    /// The caller is expected to run this scan and the subsequent hit
    /// handling under one lock; interleaving it with other accesses would
    /// double-count or skip hits.
    pub fn find_match<A, E>(
        &mut self,
        activation: &A,
        kind: EventKind,
        evaluator: &mut E,
    ) -> Option<BreakpointHit>
    where
        A: Activation<Code = C>,
        E: ConditionEvaluator<A>,
    {
        let candidates = match kind {
            EventKind::Line | EventKind::Instruction => {
                let key = (self.canonic(activation.file()), activation.line());
                self.by_line.get(&key).cloned().unwrap_or_default()
            }
            EventKind::Call => self
                .by_code
                .get(&activation.code())
                .cloned()
                .unwrap_or_default(),
            EventKind::Return | EventKind::Exception => return None,
        };

        for number in candidates {
            let Some(breakpoint) = self
                .slots
                .get_mut(number as usize - 1)
                .and_then(Option::as_mut)
            else {
                continue;
            };

            if !breakpoint.enabled {
                continue;
            }

            if !identity_guard(breakpoint, activation, kind) {
                continue;
            }

            breakpoint.hit_count += 1;

            let condition = match &breakpoint.condition {
                None => Ok(true),
                Some(expr) => {
                    let expr = expr.clone();
                    evaluator.evaluate(&expr, activation)
                }
            };

            match condition {
                Ok(true) => {
                    if breakpoint.ignore_count > 0 {
                        breakpoint.ignore_count -= 1;
                        continue;
                    }

                    return Some(BreakpointHit {
                        number,
                        temporary: breakpoint.temporary,
                        auto_delete: true,
                        condition_error: None,
                    });
                }
                Ok(false) => continue,
                Err(error) => {
                    return Some(BreakpointHit {
                        number,
                        temporary: breakpoint.temporary,
                        auto_delete: false,
                        condition_error: Some(error.to_string()),
                    });
                }
            }
        }

        None
    }
}

/// Checks that the event's activation really is what the breakpoint targets.
///
/// For call targets this is where the first executable line gets captured:
/// the first fresh activation of the code pins it, and every later entry has
/// to start on the same line.
fn identity_guard<A, C>(breakpoint: &mut Breakpoint<C>, activation: &A, kind: EventKind) -> bool
where
    A: Activation<Code = C>,
    C: Clone + Eq + Hash,
{
    match (&mut breakpoint.target, kind) {
        (BreakTarget::Line { .. }, EventKind::Line) => breakpoint.offset.is_none_or(|offset| {
            // offset-precision stop: the line alone is not enough
            offset == activation.instr_offset()
        }),
        (BreakTarget::Line { .. }, EventKind::Instruction) => breakpoint
            .offset
            .is_some_and(|offset| offset == activation.instr_offset()),
        (BreakTarget::Code { code, first_line }, EventKind::Call) => {
            if *code != activation.code() {
                return false;
            }

            match first_line {
                None => {
                    *first_line = Some(activation.line());
                    true
                }
                Some(line) => *line == activation.line(),
            }
        }
        _ => false,
    }
}

/// Lexically normalizes a path: redundant separators and `.`/`..` segments
/// are folded without touching the filesystem (breakpoints may name files
/// that are not present where the debugger runs).
fn normalize_path(file: &str) -> String {
    let mut normalized = PathBuf::new();

    for component in PathBuf::from(file).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }

    normalized.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::activation::FrameId;

    #[derive(Clone, Debug)]
    struct FakeActivation {
        code: &'static str,
        file: &'static str,
        line: u32,
        offset: u32,
    }

    impl Activation for FakeActivation {
        type Code = &'static str;
        type Value = i64;

        fn frame_id(&self) -> FrameId {
            FrameId(0)
        }

        fn code(&self) -> Self::Code {
            self.code
        }

        fn file(&self) -> &str {
            self.file
        }

        fn line(&self) -> u32 {
            self.line
        }

        fn instr_offset(&self) -> u32 {
            self.offset
        }

        fn caller(&self) -> Option<Self> {
            None
        }
    }

    fn at(file: &'static str, line: u32) -> FakeActivation {
        FakeActivation {
            code: "f",
            file,
            line,
            offset: 0,
        }
    }

    /// Evaluator that always reports the configured outcome.
    struct FixedEvaluator(core::result::Result<bool, ()>);

    #[derive(thiserror::Error, Debug)]
    #[error("boom")]
    struct Boom;

    impl ConditionEvaluator<FakeActivation> for FixedEvaluator {
        type Error = Boom;

        fn evaluate(
            &mut self,
            _expr: &str,
            _activation: &FakeActivation,
        ) -> core::result::Result<bool, Self::Error> {
            self.0.map_err(|()| Boom)
        }
    }

    /// Evaluator for unconditional breakpoints only.
    struct NoEvaluator;

    impl ConditionEvaluator<FakeActivation> for NoEvaluator {
        type Error = Infallible;

        fn evaluate(
            &mut self,
            _expr: &str,
            _activation: &FakeActivation,
        ) -> core::result::Result<bool, Self::Error> {
            Ok(true)
        }
    }

    #[test]
    fn numbers_are_permanent() {
        let mut registry = BreakpointRegistry::<&str>::new();

        let first = registry.add(BreakpointSpec::at_line("a.si", 1)).ok();
        assert_eq!(first, Some(1));

        registry.delete(1).ok();
        assert_eq!(registry.get(1), Err(Error::AlreadyDeleted(1)));

        let second = registry.add(BreakpointSpec::at_line("a.si", 2)).ok();
        assert_eq!(second, Some(2));
    }

    #[test]
    fn delete_is_idempotent_on_deleted_numbers() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_line("a.si", 1)).ok();

        assert_eq!(registry.delete(1), Ok(()));
        assert_eq!(registry.delete(1), Err(Error::AlreadyDeleted(1)));
        assert_eq!(registry.delete(7), Err(Error::NotFound(7)));
    }

    #[test]
    fn add_requires_a_target() {
        let mut registry = BreakpointRegistry::<&str>::new();

        let spec = BreakpointSpec {
            file: Some("a.si".to_owned()),
            ..BreakpointSpec::default()
        };

        assert_eq!(registry.add(spec), Err(Error::InvalidLocation));
        assert!(registry.numbers().is_empty());
    }

    #[test]
    fn delete_by_line_removes_every_colocated_breakpoint() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_line("lineA.si", 5)).ok();
        registry
            .add(BreakpointSpec::at_line("lineB.si", 10).temporary())
            .ok();
        registry.add(BreakpointSpec::at_line("lineC.si", 10)).ok();
        registry.add(BreakpointSpec::at_line("lineC.si", 10)).ok();
        registry.add(BreakpointSpec::at_line("lineC.si", 10)).ok();

        assert_eq!(registry.numbers(), vec![1, 2, 3, 4, 5]);

        assert_eq!(registry.delete_by_line("lineC.si", 10), vec![3, 4, 5]);
        assert_eq!(registry.delete_by_line("lineC.si", 10), Vec::<u32>::new());
        assert_eq!(registry.numbers(), vec![1, 2]);
    }

    #[test]
    fn reset_keeps_numbering_monotonic() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_line("a.si", 1)).ok();
        registry.add(BreakpointSpec::at_line("a.si", 2)).ok();

        registry.disable_all();
        assert!(registry.get(1).is_ok_and(|bp| !bp.is_enabled()));
        assert!(registry.get(2).is_ok_and(|bp| !bp.is_enabled()));

        registry.enable_all();
        assert!(registry.get(1).is_ok_and(Breakpoint::is_enabled));

        registry.reset();
        assert!(registry.numbers().is_empty());

        assert_eq!(registry.add(BreakpointSpec::at_line("a.si", 3)), Ok(3));
    }

    #[test]
    fn ignore_count_consumed_only_by_true_conditions() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry
            .add(BreakpointSpec::at_line("a.si", 3).with_condition("x"))
            .ok();
        registry.set_ignore(1, 2).ok();

        let activation = at("a.si", 3);

        // false condition: hits count, ignore stays
        let mut falsy = FixedEvaluator(Ok(false));
        assert!(
            registry
                .find_match(&activation, EventKind::Line, &mut falsy)
                .is_none()
        );
        assert_eq!(registry.get(1).map(Breakpoint::ignore_count), Ok(2));

        // true condition: two ignored hits, then a stop
        let mut truthy = FixedEvaluator(Ok(true));
        for _ in 0..2 {
            assert!(
                registry
                    .find_match(&activation, EventKind::Line, &mut truthy)
                    .is_none()
            );
        }

        let hit = registry.find_match(&activation, EventKind::Line, &mut truthy);
        assert_eq!(hit.map(|h| h.number), Some(1));
        assert_eq!(registry.get(1).map(Breakpoint::hit_count), Ok(4));
        assert_eq!(registry.get(1).map(Breakpoint::ignore_count), Ok(0));
    }

    #[test]
    fn broken_condition_matches_without_auto_delete() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry
            .add(
                BreakpointSpec::at_line("a.si", 3)
                    .with_condition("nonsense")
                    .temporary(),
            )
            .ok();

        let mut broken = FixedEvaluator(Err(()));
        let hit = registry
            .find_match(&at("a.si", 3), EventKind::Line, &mut broken)
            .map(|h| (h.auto_delete, h.condition_error.is_some()));

        assert_eq!(hit, Some((false, true)));
        assert!(registry.get(1).is_ok());
    }

    #[test]
    fn disabled_breakpoints_never_count_hits() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_line("a.si", 3)).ok();
        registry.disable(1).ok();

        let mut evaluator = NoEvaluator;
        assert!(
            registry
                .find_match(&at("a.si", 3), EventKind::Line, &mut evaluator)
                .is_none()
        );
        assert_eq!(registry.get(1).map(Breakpoint::hit_count), Ok(0));

        registry.enable(1).ok();
        assert!(
            registry
                .find_match(&at("a.si", 3), EventKind::Line, &mut evaluator)
                .is_some()
        );
    }

    #[test]
    fn code_target_pins_its_first_line() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_code("f")).ok();

        let mut evaluator = NoEvaluator;

        let entry = FakeActivation {
            code: "f",
            file: "a.si",
            line: 7,
            offset: 0,
        };

        assert!(
            registry
                .find_match(&entry, EventKind::Call, &mut evaluator)
                .is_some()
        );

        // re-entry on the same line matches; a different line does not
        assert!(
            registry
                .find_match(&entry, EventKind::Call, &mut evaluator)
                .is_some()
        );

        let elsewhere = FakeActivation {
            line: 9,
            ..entry.clone()
        };
        assert!(
            registry
                .find_match(&elsewhere, EventKind::Call, &mut evaluator)
                .is_none()
        );
    }

    #[test]
    fn offset_breakpoints_require_the_exact_offset() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry
            .add(BreakpointSpec::at_line("a.si", 3).with_offset(4))
            .ok();

        let mut evaluator = NoEvaluator;

        let miss = FakeActivation {
            code: "f",
            file: "a.si",
            line: 3,
            offset: 2,
        };
        assert!(
            registry
                .find_match(&miss, EventKind::Instruction, &mut evaluator)
                .is_none()
        );

        let exact = FakeActivation { offset: 4, ..miss };
        assert!(
            registry
                .find_match(&exact, EventKind::Instruction, &mut evaluator)
                .is_some()
        );
    }

    #[test]
    fn listing_format_is_stable() {
        let mut registry = BreakpointRegistry::<&str>::new();

        registry.add(BreakpointSpec::at_line("src/./demo.si", 12)).ok();
        registry
            .add(
                BreakpointSpec::at_line("demo.si", 20)
                    .with_condition("x == 3")
                    .temporary(),
            )
            .ok();
        registry.set_ignore(2, 2).ok();

        assert_eq!(
            registry.format(1).as_deref(),
            Ok("1 breakpoint keep yes - at src/demo.si:12")
        );
        assert_eq!(
            registry.format(2).as_deref(),
            Ok("2 breakpoint del yes - at demo.si:20\n\
                \tstop only if x == 3\n\
                \tignore next 2 hits")
        );

        registry.disable(1).ok();

        let mut evaluator = NoEvaluator;
        let _ = registry.find_match(&at("demo.si", 20), EventKind::Line, &mut evaluator);

        assert_eq!(
            registry.format(1).as_deref(),
            Ok("1 breakpoint keep no - at src/demo.si:12")
        );
        assert_eq!(
            registry.format(2).as_deref(),
            Ok("2 breakpoint del yes - at demo.si:20\n\
                \tstop only if x == 3\n\
                \tignore next 1 hits\n\
                \tbreakpoint already hit 1 time")
        );
    }
}
