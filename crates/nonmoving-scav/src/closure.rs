//! Heap object representation.
//!
//! A closure is an [`InfoTable`] header followed by a payload of [`Word`]s.
//! The info table carries the raw shape tag, so a corrupted heap can present a
//! tag that does not decode into any [`ClosureType`]. Field offsets for the
//! structured shapes live in [`layout`].

use std::fmt;

// ============================================================================
// Word
// ============================================================================

/// One machine word of closure payload.
///
/// Pointer fields hold the address of the referenced closure; non-pointer
/// fields hold raw integers.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Word(usize);

impl Word {
    /// The null word.
    pub const NULL: Self = Self(0);

    /// Wrap a raw machine word.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw machine word.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Whether this word is zero.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset an address by `bytes`.
    #[must_use]
    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#x})", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for Word {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

// ============================================================================
// ClosureType
// ============================================================================

/// The closed set of heap object shapes.
///
/// Mutable-capable shapes come in clean/dirty pairs so that the header tag
/// alone records whether the object needs rescanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum ClosureType {
    InvalidObject = 0,
    Constr = 1,
    Constr1_0 = 2,
    Constr0_1 = 3,
    Constr2_0 = 4,
    Constr1_1 = 5,
    Constr0_2 = 6,
    ConstrNoCaf = 7,
    Fun = 8,
    Fun1_0 = 9,
    Fun0_1 = 10,
    Fun2_0 = 11,
    Fun1_1 = 12,
    Fun0_2 = 13,
    FunStatic = 14,
    Thunk = 15,
    Thunk1_0 = 16,
    Thunk0_1 = 17,
    Thunk2_0 = 18,
    Thunk1_1 = 19,
    Thunk0_2 = 20,
    ThunkStatic = 21,
    ThunkSelector = 22,
    Bco = 23,
    Ap = 24,
    Pap = 25,
    ApStack = 26,
    Ind = 27,
    IndStatic = 28,
    RetBco = 29,
    RetSmall = 30,
    RetBig = 31,
    RetFun = 32,
    UpdateFrame = 33,
    CatchFrame = 34,
    UnderflowFrame = 35,
    StopFrame = 36,
    BlockingQueueClean = 37,
    Blackhole = 38,
    MvarClean = 39,
    MvarDirty = 40,
    TvarClean = 41,
    ArrWords = 42,
    MutArrPtrsClean = 43,
    MutArrPtrsDirty = 44,
    MutArrPtrsFrozenDirty = 45,
    MutArrPtrsFrozenClean = 46,
    MutVarClean = 47,
    MutVarDirty = 48,
    Weak = 49,
    Prim = 50,
    MutPrim = 51,
    Tso = 52,
    Stack = 53,
    TrecChunk = 54,
    AtomicallyFrame = 55,
    CatchRetryFrame = 56,
    CatchStmFrame = 57,
    Whitehole = 58,
    SmallMutArrPtrsClean = 59,
    SmallMutArrPtrsDirty = 60,
    SmallMutArrPtrsFrozenDirty = 61,
    SmallMutArrPtrsFrozenClean = 62,
    CompactNfdata = 63,
    BlockingQueueDirty = 64,
    TvarDirty = 65,
}

/// Number of raw tags that decode into a [`ClosureType`].
pub const N_CLOSURE_TYPES: u16 = 66;

const ALL_TYPES: [ClosureType; N_CLOSURE_TYPES as usize] = {
    use ClosureType as T;
    [
        T::InvalidObject,
        T::Constr,
        T::Constr1_0,
        T::Constr0_1,
        T::Constr2_0,
        T::Constr1_1,
        T::Constr0_2,
        T::ConstrNoCaf,
        T::Fun,
        T::Fun1_0,
        T::Fun0_1,
        T::Fun2_0,
        T::Fun1_1,
        T::Fun0_2,
        T::FunStatic,
        T::Thunk,
        T::Thunk1_0,
        T::Thunk0_1,
        T::Thunk2_0,
        T::Thunk1_1,
        T::Thunk0_2,
        T::ThunkStatic,
        T::ThunkSelector,
        T::Bco,
        T::Ap,
        T::Pap,
        T::ApStack,
        T::Ind,
        T::IndStatic,
        T::RetBco,
        T::RetSmall,
        T::RetBig,
        T::RetFun,
        T::UpdateFrame,
        T::CatchFrame,
        T::UnderflowFrame,
        T::StopFrame,
        T::BlockingQueueClean,
        T::Blackhole,
        T::MvarClean,
        T::MvarDirty,
        T::TvarClean,
        T::ArrWords,
        T::MutArrPtrsClean,
        T::MutArrPtrsDirty,
        T::MutArrPtrsFrozenDirty,
        T::MutArrPtrsFrozenClean,
        T::MutVarClean,
        T::MutVarDirty,
        T::Weak,
        T::Prim,
        T::MutPrim,
        T::Tso,
        T::Stack,
        T::TrecChunk,
        T::AtomicallyFrame,
        T::CatchRetryFrame,
        T::CatchStmFrame,
        T::Whitehole,
        T::SmallMutArrPtrsClean,
        T::SmallMutArrPtrsDirty,
        T::SmallMutArrPtrsFrozenDirty,
        T::SmallMutArrPtrsFrozenClean,
        T::CompactNfdata,
        T::BlockingQueueDirty,
        T::TvarDirty,
    ]
};

/// Whether a mutable-capable object currently needs rescanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cleanliness {
    /// No reference into a younger generation is outstanding.
    Clean,
    /// The mutator may have written since the last scan.
    Dirty,
}

impl ClosureType {
    /// Decode a raw header tag.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw < N_CLOSURE_TYPES {
            Some(ALL_TYPES[raw as usize])
        } else {
            None
        }
    }

    /// The raw header tag.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Clean/dirty state for shapes that track it, `None` otherwise.
    #[must_use]
    pub const fn cleanliness(self) -> Option<Cleanliness> {
        match self {
            Self::MvarClean
            | Self::TvarClean
            | Self::MutVarClean
            | Self::BlockingQueueClean
            | Self::MutArrPtrsClean
            | Self::MutArrPtrsFrozenClean
            | Self::SmallMutArrPtrsClean
            | Self::SmallMutArrPtrsFrozenClean => Some(Cleanliness::Clean),
            Self::MvarDirty
            | Self::TvarDirty
            | Self::MutVarDirty
            | Self::BlockingQueueDirty
            | Self::MutArrPtrsDirty
            | Self::MutArrPtrsFrozenDirty
            | Self::SmallMutArrPtrsDirty
            | Self::SmallMutArrPtrsFrozenDirty => Some(Cleanliness::Dirty),
            _ => None,
        }
    }

    /// The tag a fully traced object of this shape takes.
    ///
    /// Clean tags map to themselves; shapes without a clean/dirty pair
    /// return `None`.
    #[must_use]
    pub const fn clean_sibling(self) -> Option<Self> {
        match self {
            Self::MvarClean | Self::MvarDirty => Some(Self::MvarClean),
            Self::TvarClean | Self::TvarDirty => Some(Self::TvarClean),
            Self::MutVarClean | Self::MutVarDirty => Some(Self::MutVarClean),
            Self::BlockingQueueClean | Self::BlockingQueueDirty => Some(Self::BlockingQueueClean),
            Self::MutArrPtrsClean | Self::MutArrPtrsDirty => Some(Self::MutArrPtrsClean),
            Self::MutArrPtrsFrozenClean | Self::MutArrPtrsFrozenDirty => {
                Some(Self::MutArrPtrsFrozenClean)
            }
            Self::SmallMutArrPtrsClean | Self::SmallMutArrPtrsDirty => {
                Some(Self::SmallMutArrPtrsClean)
            }
            Self::SmallMutArrPtrsFrozenClean | Self::SmallMutArrPtrsFrozenDirty => {
                Some(Self::SmallMutArrPtrsFrozenClean)
            }
            _ => None,
        }
    }

    /// The runtime's conventional name for this shape.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InvalidObject => "INVALID_OBJECT",
            Self::Constr => "CONSTR",
            Self::Constr1_0 => "CONSTR_1_0",
            Self::Constr0_1 => "CONSTR_0_1",
            Self::Constr2_0 => "CONSTR_2_0",
            Self::Constr1_1 => "CONSTR_1_1",
            Self::Constr0_2 => "CONSTR_0_2",
            Self::ConstrNoCaf => "CONSTR_NOCAF",
            Self::Fun => "FUN",
            Self::Fun1_0 => "FUN_1_0",
            Self::Fun0_1 => "FUN_0_1",
            Self::Fun2_0 => "FUN_2_0",
            Self::Fun1_1 => "FUN_1_1",
            Self::Fun0_2 => "FUN_0_2",
            Self::FunStatic => "FUN_STATIC",
            Self::Thunk => "THUNK",
            Self::Thunk1_0 => "THUNK_1_0",
            Self::Thunk0_1 => "THUNK_0_1",
            Self::Thunk2_0 => "THUNK_2_0",
            Self::Thunk1_1 => "THUNK_1_1",
            Self::Thunk0_2 => "THUNK_0_2",
            Self::ThunkStatic => "THUNK_STATIC",
            Self::ThunkSelector => "THUNK_SELECTOR",
            Self::Bco => "BCO",
            Self::Ap => "AP",
            Self::Pap => "PAP",
            Self::ApStack => "AP_STACK",
            Self::Ind => "IND",
            Self::IndStatic => "IND_STATIC",
            Self::RetBco => "RET_BCO",
            Self::RetSmall => "RET_SMALL",
            Self::RetBig => "RET_BIG",
            Self::RetFun => "RET_FUN",
            Self::UpdateFrame => "UPDATE_FRAME",
            Self::CatchFrame => "CATCH_FRAME",
            Self::UnderflowFrame => "UNDERFLOW_FRAME",
            Self::StopFrame => "STOP_FRAME",
            Self::BlockingQueueClean => "BLOCKING_QUEUE_CLEAN",
            Self::Blackhole => "BLACKHOLE",
            Self::MvarClean => "MVAR_CLEAN",
            Self::MvarDirty => "MVAR_DIRTY",
            Self::TvarClean => "TVAR_CLEAN",
            Self::ArrWords => "ARR_WORDS",
            Self::MutArrPtrsClean => "MUT_ARR_PTRS_CLEAN",
            Self::MutArrPtrsDirty => "MUT_ARR_PTRS_DIRTY",
            Self::MutArrPtrsFrozenDirty => "MUT_ARR_PTRS_FROZEN_DIRTY",
            Self::MutArrPtrsFrozenClean => "MUT_ARR_PTRS_FROZEN_CLEAN",
            Self::MutVarClean => "MUT_VAR_CLEAN",
            Self::MutVarDirty => "MUT_VAR_DIRTY",
            Self::Weak => "WEAK",
            Self::Prim => "PRIM",
            Self::MutPrim => "MUT_PRIM",
            Self::Tso => "TSO",
            Self::Stack => "STACK",
            Self::TrecChunk => "TREC_CHUNK",
            Self::AtomicallyFrame => "ATOMICALLY_FRAME",
            Self::CatchRetryFrame => "CATCH_RETRY_FRAME",
            Self::CatchStmFrame => "CATCH_STM_FRAME",
            Self::Whitehole => "WHITEHOLE",
            Self::SmallMutArrPtrsClean => "SMALL_MUT_ARR_PTRS_CLEAN",
            Self::SmallMutArrPtrsDirty => "SMALL_MUT_ARR_PTRS_DIRTY",
            Self::SmallMutArrPtrsFrozenDirty => "SMALL_MUT_ARR_PTRS_FROZEN_DIRTY",
            Self::SmallMutArrPtrsFrozenClean => "SMALL_MUT_ARR_PTRS_FROZEN_CLEAN",
            Self::CompactNfdata => "COMPACT_NFDATA",
            Self::BlockingQueueDirty => "BLOCKING_QUEUE_DIRTY",
            Self::TvarDirty => "TVAR_DIRTY",
        }
    }
}

impl TryFrom<u16> for ClosureType {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or(raw)
    }
}

impl fmt::Display for ClosureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Payload layouts
// ============================================================================

/// Word offsets into the payload of the structured shapes.
pub mod layout {
    /// `MUT_VAR_CLEAN` / `MUT_VAR_DIRTY`.
    pub mod mut_var {
        /// The referenced value.
        pub const VAR: usize = 0;
        /// Payload words.
        pub const SIZE: usize = 1;
    }

    /// `MVAR_CLEAN` / `MVAR_DIRTY`.
    pub mod mvar {
        /// Head of the blocked-task queue.
        pub const HEAD: usize = 0;
        /// Tail of the blocked-task queue.
        pub const TAIL: usize = 1;
        /// Current value.
        pub const VALUE: usize = 2;
        /// Payload words.
        pub const SIZE: usize = 3;
    }

    /// `TVAR_CLEAN` / `TVAR_DIRTY`.
    pub mod tvar {
        /// Current value.
        pub const CURRENT_VALUE: usize = 0;
        /// Head of the watch queue.
        pub const FIRST_WATCH_QUEUE_ENTRY: usize = 1;
        /// Update counter (not a pointer).
        pub const NUM_UPDATES: usize = 2;
        /// Payload words.
        pub const SIZE: usize = 3;
    }

    /// `WEAK`.
    pub mod weak {
        /// List of C finalizers.
        pub const CFINALIZERS: usize = 0;
        /// Key whose liveness decides the weak reference.
        pub const KEY: usize = 1;
        /// Value kept alive while the key is.
        pub const VALUE: usize = 2;
        /// Finalizer closure.
        pub const FINALIZER: usize = 3;
        /// Link to the next weak reference of the generation.
        pub const LINK: usize = 4;
        /// Payload words.
        pub const SIZE: usize = 5;
    }

    /// `BCO`.
    pub mod bco {
        /// Byte array of instructions.
        pub const INSTRS: usize = 0;
        /// Byte array of literals.
        pub const LITERALS: usize = 1;
        /// Pointer array of referenced closures.
        pub const PTRS: usize = 2;
        /// Arity (not a pointer).
        pub const ARITY: usize = 3;
        /// Payload words.
        pub const SIZE: usize = 4;
    }

    /// `BLACKHOLE`.
    pub mod ind {
        /// Owner or final value.
        pub const INDIRECTEE: usize = 0;
        /// Payload words.
        pub const SIZE: usize = 1;
    }

    /// `BLOCKING_QUEUE_CLEAN` / `BLOCKING_QUEUE_DIRTY`.
    pub mod blocking_queue {
        /// Next queue of the owning task.
        pub const LINK: usize = 0;
        /// The blackhole being blocked on.
        pub const BH: usize = 1;
        /// Task evaluating the blackhole.
        pub const OWNER: usize = 2;
        /// Blocked tasks.
        pub const QUEUE: usize = 3;
        /// Payload words.
        pub const SIZE: usize = 4;
    }

    /// `THUNK_SELECTOR`.
    pub mod selector {
        /// Closure the field is selected from.
        pub const SELECTEE: usize = 0;
        /// Payload words.
        pub const SIZE: usize = 1;
    }

    /// `AP_STACK`.
    pub mod ap_stack {
        /// Number of saved stack words (not a pointer).
        pub const SIZE: usize = 0;
        /// Function being applied.
        pub const FUN: usize = 1;
        /// First saved stack word.
        pub const STACK: usize = 2;
    }

    /// `ARR_WORDS`.
    pub mod arr_words {
        /// Length in bytes (not a pointer).
        pub const BYTES: usize = 0;
        /// First data word.
        pub const DATA: usize = 1;
    }

    /// `MUT_ARR_PTRS_*`.
    pub mod mut_arr_ptrs {
        /// Number of elements.
        pub const PTRS: usize = 0;
        /// Words of elements plus card table.
        pub const SIZE: usize = 1;
        /// First element.
        pub const ELEMS: usize = 2;
        /// Elements covered by one card-table word.
        pub const CARD_SIZE: usize = 128;

        /// Card-table words for an array of `ptrs` elements.
        #[must_use]
        pub const fn cards(ptrs: usize) -> usize {
            ptrs.div_ceil(CARD_SIZE)
        }
    }

    /// `SMALL_MUT_ARR_PTRS_*`.
    pub mod small_mut_arr_ptrs {
        /// Number of elements.
        pub const PTRS: usize = 0;
        /// First element.
        pub const ELEMS: usize = 1;
    }

    /// `STACK`.
    pub mod stack {
        /// Stack size in words.
        pub const STACK_SIZE: usize = 0;
        /// Nonzero if the stack may reference a younger generation.
        pub const DIRTY: usize = 1;
        /// Mark-phase bookkeeping (not a pointer).
        pub const MARKING: usize = 2;
        /// Stack pointer as an index into the stack words.
        pub const SP: usize = 3;
        /// First stack word.
        pub const STACK: usize = 4;
    }

    /// `TREC_CHUNK`.
    pub mod trec_chunk {
        /// Previous chunk of the transaction record.
        pub const PREV_CHUNK: usize = 0;
        /// Number of used entries.
        pub const NEXT_ENTRY_IDX: usize = 1;
        /// First entry.
        pub const ENTRIES: usize = 2;
        /// Words per entry.
        pub const ENTRY_WORDS: usize = 3;
        /// Entry offset of the transactional variable.
        pub const TVAR: usize = 0;
        /// Entry offset of the value read.
        pub const EXPECTED_VALUE: usize = 1;
        /// Entry offset of the value to write.
        pub const NEW_VALUE: usize = 2;
    }
}

// ============================================================================
// InfoTable
// ============================================================================

/// Pointer/non-pointer word counts of a generically laid out closure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    /// Pointer words at the start of the payload.
    pub ptrs: u32,
    /// Non-pointer words that follow.
    pub nptrs: u32,
}

impl Layout {
    /// Create a layout.
    #[must_use]
    pub const fn new(ptrs: u32, nptrs: u32) -> Self {
        Self { ptrs, nptrs }
    }
}

/// Closure header: shape tag, layout and static reference table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoTable {
    /// Raw shape tag. Decoded with [`InfoTable::closure_type`].
    pub raw_type: u16,
    /// Field counts for variable-arity shapes.
    pub layout: Layout,
    /// Static reference table of a function or thunk.
    pub srt: Option<Word>,
}

impl InfoTable {
    /// Info table for `ty` with the given layout and no static references.
    #[must_use]
    pub const fn new(ty: ClosureType, layout: Layout) -> Self {
        Self {
            raw_type: ty.raw(),
            layout,
            srt: None,
        }
    }

    /// Info table carrying an arbitrary raw tag.
    #[must_use]
    pub const fn from_raw(raw_type: u16, layout: Layout) -> Self {
        Self {
            raw_type,
            layout,
            srt: None,
        }
    }

    /// Attach a static reference table.
    #[must_use]
    pub const fn with_srt(mut self, srt: Word) -> Self {
        self.srt = Some(srt);
        self
    }

    /// Decode the shape tag, returning the raw tag on failure.
    ///
    /// # Errors
    ///
    /// Returns the raw tag if it does not name a known shape.
    pub const fn closure_type(&self) -> Result<ClosureType, u16> {
        match ClosureType::from_raw(self.raw_type) {
            Some(ty) => Ok(ty),
            None => Err(self.raw_type),
        }
    }
}

// ============================================================================
// Closure
// ============================================================================

/// A heap object: header plus payload words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Closure {
    info: InfoTable,
    payload: Vec<Word>,
}

impl Closure {
    /// Create a closure from an info table and payload.
    #[must_use]
    pub const fn from_parts(info: InfoTable, payload: Vec<Word>) -> Self {
        Self { info, payload }
    }

    /// A closure of shape `ty` whose payload words are all pointers.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(ty: ClosureType, payload: Vec<Word>) -> Self {
        let layout = Layout::new(payload.len() as u32, 0);
        Self::from_parts(InfoTable::new(ty, layout), payload)
    }

    /// A closure with pointer words first and non-pointer words after.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_layout(ty: ClosureType, ptrs: &[Word], nptrs: &[Word]) -> Self {
        let layout = Layout::new(ptrs.len() as u32, nptrs.len() as u32);
        let payload = ptrs.iter().chain(nptrs).copied().collect();
        Self::from_parts(InfoTable::new(ty, layout), payload)
    }

    /// Placeholder for a slot that holds no object.
    #[must_use]
    pub const fn free() -> Self {
        Self::from_parts(
            InfoTable::new(ClosureType::InvalidObject, Layout::new(0, 0)),
            Vec::new(),
        )
    }

    /// A dirty synchronization variable.
    #[must_use]
    pub fn mvar(head: Word, tail: Word, value: Word) -> Self {
        Self::new(ClosureType::MvarDirty, vec![head, tail, value])
    }

    /// A dirty transactional variable.
    #[must_use]
    pub fn tvar(current_value: Word, first_watch_queue_entry: Word) -> Self {
        Self::with_layout(
            ClosureType::TvarDirty,
            &[current_value, first_watch_queue_entry],
            &[Word::NULL],
        )
    }

    /// A dirty mutable variable.
    #[must_use]
    pub fn mut_var(var: Word) -> Self {
        Self::new(ClosureType::MutVarDirty, vec![var])
    }

    /// A weak reference.
    #[must_use]
    pub fn weak(key: Word, value: Word, finalizer: Word, cfinalizers: Word, link: Word) -> Self {
        Self::new(
            ClosureType::Weak,
            vec![cfinalizers, key, value, finalizer, link],
        )
    }

    /// A dirty blocking queue.
    #[must_use]
    pub fn blocking_queue(link: Word, bh: Word, owner: Word, queue: Word) -> Self {
        Self::new(ClosureType::BlockingQueueDirty, vec![link, bh, owner, queue])
    }

    /// An opaque byte array of `bytes` bytes.
    #[must_use]
    pub fn arr_words(bytes: usize) -> Self {
        let words = bytes.div_ceil(std::mem::size_of::<usize>());
        let mut payload = vec![Word::NULL; 1 + words];
        payload[layout::arr_words::BYTES] = Word::new(bytes);
        Self::from_parts(
            InfoTable::new(ClosureType::ArrWords, Layout::new(0, 0)),
            payload,
        )
    }

    /// A mutable pointer array of shape `ty` with a cleared card table.
    #[must_use]
    pub fn mut_arr_ptrs(ty: ClosureType, elems: &[Word]) -> Self {
        let cards = layout::mut_arr_ptrs::cards(elems.len());
        let mut payload = Vec::with_capacity(layout::mut_arr_ptrs::ELEMS + elems.len() + cards);
        payload.push(Word::new(elems.len()));
        payload.push(Word::new(elems.len() + cards));
        payload.extend_from_slice(elems);
        payload.resize(payload.len() + cards, Word::NULL);
        Self::from_parts(InfoTable::new(ty, Layout::new(0, 0)), payload)
    }

    /// A small mutable pointer array of shape `ty`.
    #[must_use]
    pub fn small_mut_arr_ptrs(ty: ClosureType, elems: &[Word]) -> Self {
        let mut payload = Vec::with_capacity(1 + elems.len());
        payload.push(Word::new(elems.len()));
        payload.extend_from_slice(elems);
        Self::from_parts(InfoTable::new(ty, Layout::new(0, 0)), payload)
    }

    /// A stack chunk whose live part is `stack[sp..]`.
    #[must_use]
    pub fn stack(stack: &[Word], sp: usize) -> Self {
        let mut payload = vec![Word::new(stack.len()), Word::NULL, Word::NULL, Word::new(sp)];
        payload.extend_from_slice(stack);
        Self::from_parts(
            InfoTable::new(ClosureType::Stack, Layout::new(0, 0)),
            payload,
        )
    }

    /// A saved stack applied to `fun`.
    #[must_use]
    pub fn ap_stack(fun: Word, stack: &[Word]) -> Self {
        let mut payload = vec![Word::new(stack.len()), fun];
        payload.extend_from_slice(stack);
        Self::from_parts(
            InfoTable::new(ClosureType::ApStack, Layout::new(0, 0)),
            payload,
        )
    }

    /// A transaction record chunk with `(tvar, expected, new)` entries.
    #[must_use]
    pub fn trec_chunk(prev_chunk: Word, entries: &[(Word, Word, Word)]) -> Self {
        let mut payload = vec![prev_chunk, Word::new(entries.len())];
        for &(tvar, expected, new) in entries {
            payload.extend_from_slice(&[tvar, expected, new]);
        }
        Self::from_parts(
            InfoTable::new(ClosureType::TrecChunk, Layout::new(0, 0)),
            payload,
        )
    }

    /// The header.
    #[must_use]
    pub const fn info(&self) -> &InfoTable {
        &self.info
    }

    /// Mutable access to the header.
    pub fn info_mut(&mut self) -> &mut InfoTable {
        &mut self.info
    }

    /// Decode the shape tag.
    ///
    /// # Errors
    ///
    /// Returns the raw tag if it does not name a known shape.
    pub const fn closure_type(&self) -> Result<ClosureType, u16> {
        self.info.closure_type()
    }

    /// Payload words.
    #[must_use]
    pub fn payload(&self) -> &[Word] {
        &self.payload
    }

    /// Mutable payload words.
    pub fn payload_mut(&mut self) -> &mut [Word] {
        &mut self.payload
    }

    /// Payload word at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the payload.
    #[must_use]
    pub fn field(&self, index: usize) -> Word {
        self.payload[index]
    }

    /// Number of pointer words for generically laid out shapes.
    #[must_use]
    pub const fn ptrs(&self) -> usize {
        self.info.layout.ptrs as usize
    }

    fn word_at(&self, index: usize) -> Option<usize> {
        self.payload.get(index).map(|w| w.raw())
    }

    /// Minimum payload length the header implies, `None` if a length field
    /// the shape depends on is itself missing.
    #[must_use]
    pub fn required_payload_len(&self, ty: ClosureType) -> Option<usize> {
        use ClosureType as T;
        let len = match ty {
            T::Constr1_0 | T::Fun1_0 | T::Thunk1_0 | T::Constr0_1 | T::Fun0_1 | T::Thunk0_1 => 1,
            T::Constr2_0
            | T::Fun2_0
            | T::Thunk2_0
            | T::Constr1_1
            | T::Fun1_1
            | T::Thunk1_1
            | T::Constr0_2
            | T::Fun0_2
            | T::Thunk0_2 => 2,
            T::Fun | T::Thunk | T::Constr | T::ConstrNoCaf | T::Prim | T::MutPrim => self.ptrs(),
            T::MvarClean | T::MvarDirty => layout::mvar::SIZE,
            T::TvarClean | T::TvarDirty => layout::tvar::FIRST_WATCH_QUEUE_ENTRY + 1,
            T::Weak => layout::weak::SIZE,
            T::Bco => layout::bco::PTRS + 1,
            T::Blackhole => layout::ind::SIZE,
            T::MutVarClean | T::MutVarDirty => layout::mut_var::SIZE,
            T::BlockingQueueClean | T::BlockingQueueDirty => layout::blocking_queue::SIZE,
            T::ThunkSelector => layout::selector::SIZE,
            T::ApStack => layout::ap_stack::STACK.checked_add(self.word_at(layout::ap_stack::SIZE)?)?,
            T::ArrWords => layout::arr_words::DATA,
            T::MutArrPtrsClean
            | T::MutArrPtrsDirty
            | T::MutArrPtrsFrozenClean
            | T::MutArrPtrsFrozenDirty => {
                let ptrs = self.word_at(layout::mut_arr_ptrs::PTRS)?;
                let size = self.word_at(layout::mut_arr_ptrs::SIZE)?;
                if ptrs.checked_add(layout::mut_arr_ptrs::cards(ptrs)) != Some(size) {
                    return None;
                }
                layout::mut_arr_ptrs::ELEMS.checked_add(size)?
            }
            T::SmallMutArrPtrsClean
            | T::SmallMutArrPtrsDirty
            | T::SmallMutArrPtrsFrozenClean
            | T::SmallMutArrPtrsFrozenDirty => {
                layout::small_mut_arr_ptrs::ELEMS
                    .checked_add(self.word_at(layout::small_mut_arr_ptrs::PTRS)?)?
            }
            T::Stack => {
                let size = self.word_at(layout::stack::STACK_SIZE)?;
                if self.word_at(layout::stack::SP)? > size {
                    return None;
                }
                layout::stack::STACK.checked_add(size)?
            }
            T::TrecChunk => {
                layout::trec_chunk::ENTRY_WORDS
                    .checked_mul(self.word_at(layout::trec_chunk::NEXT_ENTRY_IDX)?)?
                    .checked_add(layout::trec_chunk::ENTRIES)?
            }
            // PAP, AP and TSO layouts are owned by the delegated tracers
            _ => 0,
        };
        Some(len)
    }

    /// Whether the payload is long enough for the header's shape.
    #[must_use]
    pub fn looks_like_closure(&self, ty: ClosureType) -> bool {
        self.required_payload_len(ty)
            .is_some_and(|len| self.payload.len() >= len)
    }

    /// Current clean/dirty state, `None` for shapes that do not track it.
    #[must_use]
    pub fn cleanliness(&self) -> Option<Cleanliness> {
        self.closure_type().ok().and_then(ClosureType::cleanliness)
    }

    /// Move the header to its clean sibling.
    ///
    /// Returns the new shape, or `None` if the shape has no clean/dirty pair
    /// (the header is left untouched).
    pub fn mark_clean(&mut self) -> Option<ClosureType> {
        let clean = self.closure_type().ok()?.clean_sibling()?;
        self.info.raw_type = clean.raw();
        Some(clean)
    }

    /// Move the header to the dirty sibling of its shape.
    ///
    /// Mutator write barriers do this; the scavenger never does. Returns
    /// the new shape, or `None` for shapes without a clean/dirty pair.
    pub fn mark_dirty(&mut self) -> Option<ClosureType> {
        use ClosureType as T;
        let dirty = match self.closure_type().ok()?.clean_sibling()? {
            T::MvarClean => T::MvarDirty,
            T::TvarClean => T::TvarDirty,
            T::MutVarClean => T::MutVarDirty,
            T::BlockingQueueClean => T::BlockingQueueDirty,
            T::MutArrPtrsClean => T::MutArrPtrsDirty,
            T::MutArrPtrsFrozenClean => T::MutArrPtrsFrozenDirty,
            T::SmallMutArrPtrsClean => T::SmallMutArrPtrsDirty,
            T::SmallMutArrPtrsFrozenClean => T::SmallMutArrPtrsFrozenDirty,
            _ => return None,
        };
        self.info.raw_type = dirty.raw();
        Some(dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_tags_round_trip_through_decoder() {
        for raw in 0..N_CLOSURE_TYPES {
            let ty = ClosureType::from_raw(raw).unwrap();
            assert_eq!(ty.raw(), raw, "{ty} decoded from the wrong tag");
        }
        assert_eq!(ClosureType::try_from(N_CLOSURE_TYPES), Err(N_CLOSURE_TYPES));
        assert_eq!(ClosureType::try_from(0xffff), Err(0xffff));
    }

    #[test]
    fn test_clean_sibling_is_clean_and_fixed() {
        for raw in 0..N_CLOSURE_TYPES {
            let ty = ClosureType::from_raw(raw).unwrap();
            if let Some(clean) = ty.clean_sibling() {
                assert_eq!(clean.cleanliness(), Some(Cleanliness::Clean));
                assert_eq!(clean.clean_sibling(), Some(clean));
                assert!(ty.cleanliness().is_some());
            } else {
                assert_eq!(ty.cleanliness(), None, "{ty} tracks state without a pair");
            }
        }
    }

    #[test]
    fn test_frozen_arrays_stay_frozen_when_cleaned() {
        let mut arr = Closure::mut_arr_ptrs(ClosureType::MutArrPtrsFrozenDirty, &[Word::NULL]);
        assert_eq!(arr.mark_clean(), Some(ClosureType::MutArrPtrsFrozenClean));

        let mut small =
            Closure::small_mut_arr_ptrs(ClosureType::SmallMutArrPtrsFrozenDirty, &[Word::NULL]);
        assert_eq!(
            small.mark_clean(),
            Some(ClosureType::SmallMutArrPtrsFrozenClean)
        );
    }

    #[test]
    fn test_mark_dirty_then_clean() {
        let mut mvar = Closure::mvar(Word::NULL, Word::NULL, Word::NULL);
        assert_eq!(mvar.cleanliness(), Some(Cleanliness::Dirty));
        assert_eq!(mvar.mark_clean(), Some(ClosureType::MvarClean));
        assert_eq!(mvar.cleanliness(), Some(Cleanliness::Clean));
        assert_eq!(mvar.mark_dirty(), Some(ClosureType::MvarDirty));

        let mut cons = Closure::new(ClosureType::Constr2_0, vec![Word::NULL; 2]);
        assert_eq!(cons.mark_clean(), None);
        assert_eq!(cons.closure_type(), Ok(ClosureType::Constr2_0));
    }

    #[test]
    fn test_layout_constructors() {
        let arr = Closure::mut_arr_ptrs(ClosureType::MutArrPtrsDirty, &[Word::new(8); 130]);
        assert_eq!(arr.field(layout::mut_arr_ptrs::PTRS).raw(), 130);
        assert_eq!(arr.field(layout::mut_arr_ptrs::SIZE).raw(), 132);
        assert_eq!(arr.payload().len(), 134);
        assert!(arr.looks_like_closure(ClosureType::MutArrPtrsDirty));

        let trec = Closure::trec_chunk(Word::NULL, &[(Word::new(1), Word::new(2), Word::new(3))]);
        assert!(trec.looks_like_closure(ClosureType::TrecChunk));
        assert_eq!(trec.field(layout::trec_chunk::ENTRIES + 2).raw(), 3);

        let bytes = Closure::arr_words(17);
        assert_eq!(bytes.payload().len(), 1 + 17usize.div_ceil(std::mem::size_of::<usize>()));
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let short = Closure::from_parts(
            InfoTable::new(ClosureType::MvarDirty, Layout::new(0, 0)),
            vec![Word::NULL; 2],
        );
        assert!(!short.looks_like_closure(ClosureType::MvarDirty));

        let mut arr = Closure::mut_arr_ptrs(ClosureType::MutArrPtrsDirty, &[Word::NULL; 2]);
        assert!(arr.looks_like_closure(ClosureType::MutArrPtrsDirty));
        arr.payload_mut()[layout::mut_arr_ptrs::SIZE] = Word::new(2);
        assert!(!arr.looks_like_closure(ClosureType::MutArrPtrsDirty));

        let mut stack = Closure::stack(&[Word::NULL; 4], 2);
        assert!(stack.looks_like_closure(ClosureType::Stack));
        stack.payload_mut()[layout::stack::SP] = Word::new(5);
        assert!(!stack.looks_like_closure(ClosureType::Stack));
    }
}
