use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::EngineError;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions in tie-break preference order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Position of this direction in [`Move::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Down => 1,
            Move::Left => 2,
            Move::Right => 3,
        }
    }
}

impl From<Move> for u8 {
    fn from(m: Move) -> Self { m.index() as u8 }
}

impl TryFrom<u8> for Move {
    type Error = EngineError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Move::Up),
            1 => Ok(Move::Down),
            2 => Ok(Move::Left),
            3 => Ok(Move::Right),
            other => Err(EngineError::InvalidDirection(other.to_string())),
        }
    }
}

impl FromStr for Move {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Move::Up),
            "down" | "d" => Ok(Move::Down),
            "left" | "l" => Ok(Move::Left),
            "right" | "r" => Ok(Move::Right),
            _ => Err(EngineError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

/// A cell address, `x` is the column and `y` the row, both in `0..4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

/// Result of sliding a board in one direction.
///
/// `changed == false` means the move is illegal and must not advance a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    pub points: u64,
    pub changed: bool,
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

/// Lines whose exponents are all below this are slid through the nibble table.
/// Their merges top out at 2^15, which still fits a nibble.
const TABLE_EXPONENT_LIMIT: u8 = 15;

struct Stores {
    collapsed: Box<[u16]>,
    scores: Box<[u32]>,
}

type BoardRaw = u128;
type Line = u16;

/// Packed 4x4 2048 board as 16 one-byte exponents in a `u128`.
///
/// Cell `(x, y)` lives at row-major index `y * 4 + x`; index 0 is the most
/// significant byte. A byte `e` holds the tile `2^e`, with 0 meaning empty.
/// Tile values and points are `u64`, so any tile a game can reach (2^17) and
/// any power of two a caller passes in fit; merging two 2^63 tiles overflows
/// like any other `u64` arithmetic.
///
/// `Board` is `Copy`: every transform returns a new value and leaves the
/// receiver untouched, so boards can be shared freely between search threads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u128`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u128` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from 16 tile values in row-major order.
    ///
    /// ```
    /// use twenty48_search::engine::Board;
    /// let b = Board::from_values(&[
    ///     2, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     4, 0, 0, 8,
    /// ]).unwrap();
    /// assert_eq!(b.get(0, 3).unwrap(), 4);
    /// ```
    pub fn from_values(values: &[u64]) -> Result<Self, EngineError> {
        if values.len() != 16 {
            return Err(EngineError::InvalidBoardSize(values.len()));
        }
        values.iter().enumerate().try_fold(Board::EMPTY, |board, (idx, &v)| {
            let exp = value_to_exponent(v)?;
            Ok(Board(board.0 | (u128::from(exp) << lane_shift(idx))))
        })
    }

    /// The 16 tile values in row-major order.
    pub fn values(self) -> [u64; 16] {
        let mut out = [0u64; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = exponent_to_value(extract_tile(self, idx));
        }
        out
    }

    /// Tile value at column `x`, row `y` (0 if empty).
    pub fn get(self, x: usize, y: usize) -> Result<u64, EngineError> {
        let idx = cell_index(x, y)?;
        Ok(exponent_to_value(extract_tile(self, idx)))
    }

    /// Return a copy of this board with cell `(x, y)` set to `value`.
    pub fn set(self, x: usize, y: usize, value: u64) -> Result<Self, EngineError> {
        let idx = cell_index(x, y)?;
        let exp = value_to_exponent(value)?;
        Ok(self.with_exponent(idx, exp))
    }

    #[inline]
    pub(crate) fn with_exponent(self, idx: usize, exp: u8) -> Self {
        let shift = lane_shift(idx);
        Board((self.0 & !(0xffu128 << shift)) | (u128::from(exp) << shift))
    }

    /// Slide/merge tiles in `dir`, reporting points scored and whether anything moved.
    ///
    /// ```
    /// use twenty48_search::engine::{Board, Move};
    /// let b = Board::from_values(&[
    ///     2, 0, 2, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    /// ]).unwrap();
    /// let out = b.apply_move(Move::Left);
    /// assert!(out.changed);
    /// assert_eq!(out.points, 4);
    /// assert_eq!(out.board.get(0, 0).unwrap(), 4);
    /// ```
    pub fn apply_move(self, dir: Move) -> MoveOutcome {
        let mut out: BoardRaw = 0;
        let mut points = 0;
        for lane in 0..4 {
            let cells = line_cells(dir, lane);
            let (moved, scored) = slide_line(cells.map(|idx| extract_tile(self, idx)));
            for (idx, exp) in cells.into_iter().zip(moved) {
                out |= u128::from(exp) << lane_shift(idx);
            }
            points += scored;
        }
        MoveOutcome { board: Board(out), points, changed: out != self.0 || points > 0 }
    }

    /// The board after sliding in `dir`, without points or random insert.
    #[inline]
    pub fn shift(self, dir: Move) -> Self { self.apply_move(dir).board }

    /// True if sliding in `dir` would change the board.
    #[inline]
    pub fn can_move(self, dir: Move) -> bool { self.apply_move(dir).changed }

    /// Directions that change the board, in [`Move::ALL`] order.
    pub fn legal_moves(self) -> Vec<Move> {
        Move::ALL.into_iter().filter(|&dir| self.can_move(dir)).collect()
    }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use twenty48_search::engine::Board;
    /// // Nothing can slide on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    /// Empty cells in row-major order (`y` outer, `x` inner).
    pub fn empty_cells(self) -> Vec<Position> { find_empty_cells(self) }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { count_empty(self) }

    /// Return the highest tile value present on the board (0 when empty).
    #[inline]
    pub fn max_value(self) -> u64 { max_value(self) }

    /// Pick a uniformly random empty cell, `None` on a full board.
    pub fn random_empty_cell<R: Rng + ?Sized>(self, rng: &mut R) -> Option<Position> {
        let empty = self.count_empty();
        if empty == 0 {
            return None;
        }
        let nth = rng.gen_range(0..empty) as usize;
        (0..16)
            .filter(|&idx| extract_tile(self, idx) == 0)
            .nth(nth)
            .map(|idx| Position { x: idx % 4, y: idx / 4 })
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use twenty48_search::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        match self.random_empty_cell(rng) {
            Some(pos) => self.with_exponent(pos.y * 4 + pos.x, generate_random_tile(rng)),
            None => self,
        }
    }

    /// Perform a move then insert a random tile if the move changed the board.
    ///
    /// The returned outcome carries the post-spawn board.
    pub fn make_move<R: Rng + ?Sized>(self, dir: Move, rng: &mut R) -> MoveOutcome {
        let outcome = self.apply_move(dir);
        if outcome.changed {
            MoveOutcome { board: outcome.board.with_random_tile(rng), ..outcome }
        } else {
            outcome
        }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#034x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.values().iter().map(|&v| format_val(v)).collect();
        for (y, row) in cells.chunks(4).enumerate() {
            if y > 0 {
                writeln!(f, "-----------------------------")?;
            }
            writeln!(f, "{}|{}|{}|{}", row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Build the line tables now instead of on first move. Safe to call multiple times.
pub fn init_tables() {
    let _ = stores();
}

/// Slide/merge `board` in `dir`. See [`Board::apply_move`].
#[inline]
pub fn apply_move(board: Board, dir: Move) -> MoveOutcome { board.apply_move(dir) }

/// Sugar for `apply_move(board, dir).changed`.
#[inline]
pub fn can_move(board: Board, dir: Move) -> bool { board.can_move(dir) }

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool {
    !Move::ALL.into_iter().any(|dir| board.can_move(dir))
}

/// Empty cells in row-major order (`y` outer, `x` inner).
pub fn find_empty_cells(board: Board) -> Vec<Position> {
    (0..4)
        .flat_map(|y| (0..4).map(move |x| Position { x, y }))
        .filter(|pos| extract_tile(board, pos.y * 4 + pos.x) == 0)
        .collect()
}

/// Count the number of zero tiles.
pub fn count_empty(board: Board) -> u32 {
    (0..16).filter(|&idx| extract_tile(board, idx) == 0).count() as u32
}

/// Highest tile value on the board, 0 for an empty board.
pub fn max_value(board: Board) -> u64 {
    let max_exp = (0..16).map(|idx| extract_tile(board, idx)).max().unwrap_or(0);
    exponent_to_value(max_exp)
}

#[inline]
pub(crate) fn extract_tile(board: Board, idx: usize) -> u8 {
    (board.0 >> lane_shift(idx)) as u8
}

#[inline]
pub(crate) fn exponent_to_value(exp: u8) -> u64 {
    if exp == 0 { 0 } else { 1 << exp }
}

#[inline]
fn lane_shift(idx: usize) -> u32 { 120 - 8 * idx as u32 }

/// Cell indices of one row or column, starting at the edge tiles slide toward.
#[inline]
fn line_cells(dir: Move, lane: usize) -> [usize; 4] {
    [0, 1, 2, 3].map(|i| match dir {
        Move::Up => i * 4 + lane,
        Move::Down => (3 - i) * 4 + lane,
        Move::Left => lane * 4 + i,
        Move::Right => lane * 4 + 3 - i,
    })
}

/// Slide one line toward index 0, through the table when its tiles fit a nibble.
#[inline]
fn slide_line(cells: [u8; 4]) -> ([u8; 4], u64) {
    if cells.iter().all(|&exp| exp < TABLE_EXPONENT_LIMIT) {
        let s = stores();
        let line = usize::from(pack_line(cells));
        (unpack_line(s.collapsed[line]), u64::from(s.scores[line]))
    } else {
        collapse_line(cells)
    }
}

fn cell_index(x: usize, y: usize) -> Result<usize, EngineError> {
    if x > 3 || y > 3 {
        return Err(EngineError::OutOfBounds { x, y });
    }
    Ok(y * 4 + x)
}

fn value_to_exponent(value: u64) -> Result<u8, EngineError> {
    match value {
        0 => Ok(0),
        v if v.is_power_of_two() && v >= 2 => Ok(v.trailing_zeros() as u8),
        v => Err(EngineError::InvalidTileValue(v)),
    }
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut collapsed = vec![0u16; LINE_TABLE_SIZE];
    let mut scores = vec![0u32; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let cells = unpack_line(val as Line);
        // Lines holding a 15 go through `collapse_line` directly.
        if cells.contains(&TABLE_EXPONENT_LIMIT) {
            continue;
        }
        let (moved, points) = collapse_line(cells);
        collapsed[val] = pack_line(moved);
        // At most two merges of 2^15.
        scores[val] = points as u32;
    }

    Stores { collapsed: collapsed.into_boxed_slice(), scores: scores.into_boxed_slice() }
}

fn unpack_line(line: Line) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

fn pack_line(cells: [u8; 4]) -> Line {
    cells.iter().fold(0, |acc, &c| (acc << 4) | Line::from(c))
}

/// Collapse a line of exponents toward index 0, returning it with the points scored.
///
/// `target` is the write cursor. A source tile slides into an empty target,
/// merges with an equal one (after which the cursor moves past the merged
/// cell), or pushes the cursor forward and is examined again.
fn collapse_line(mut cells: [u8; 4]) -> ([u8; 4], u64) {
    let mut target = 0;
    let mut src = 1;
    let mut points = 0;
    while src < 4 {
        let val = cells[src];
        if src == target || val == 0 {
            src += 1;
            continue;
        }
        let at_target = cells[target];
        if at_target == 0 {
            cells[target] = val;
            cells[src] = 0;
            src += 1;
        } else if at_target == val {
            cells[target] = val + 1;
            cells[src] = 0;
            points += 1u64 << (val + 1);
            target += 1;
            src += 1;
        } else {
            target += 1;
        }
    }
    (cells, points)
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn format_val(val: u64) -> String {
    if val == 0 {
        " ".repeat(6)
    } else {
        format!("{:^6}", val)
    }
}
