//! Classified statement forms
//!
//! One variant per command of the line grammar. Expression arguments are
//! kept as text; they are handed to the host evaluator when the statement
//! runs, never before.

/// Arithmetic-by-amount operators (`ADD x BY 2`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Metadata-only declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Struct,
    Enum,
    Namespace,
}

/// Edge of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    Down,
    Up,
}

/// Structural lines that close a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    EndWhile,
    EndFor,
    EndFn,
    EndEvery,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    // Declarations & variables
    Set { name: String, expr: String },
    Const { name: String, expr: String },
    Alias { alias: String, target: String },
    Declare { kind: DeclKind, body: String },

    // Math & random
    Arith { op: ArithOp, name: String, expr: String },
    Random { min: String, max: String, into: String },
    Math { func: String, expr: String, into: String },

    // Blocks
    If { cond: String },
    Else,
    EndIf,
    While { cond: String },
    For {
        var: String,
        from: String,
        to: String,
        step: Option<String>,
    },
    Function { name: String, params: Vec<String> },
    Call {
        name: String,
        args: Vec<String>,
        into: Option<String>,
    },
    Return { expr: Option<String> },
    Terminator(Terminator),

    // Lists & records
    Array { name: String, literal: String },
    Push { expr: String, into: String },
    Pop { source: String, into: String },
    Len { source: String, into: String },
    Object { name: String, literal: String },
    SetField { object: String, field: String, expr: String },
    GetField { object: String, field: String, into: String },
    Merge { left: String, right: String, into: String },

    // I/O & debug
    Print { expr: String },
    Alert { expr: String },
    Input { prompt: String, into: String },
    Trace { on: bool },

    // Time & timers
    Sleep { millis: u64 },
    TimeNow { into: String },
    Every { millis: u64, name: Option<String> },
    Tick { millis: u64, name: Option<String> },
    Cancel { name: String },
    Halt,

    // Drawing
    CanvasSize { width: u32, height: u32 },
    Color { expr: String },
    Clear,
    Rect { x: String, y: String, w: String, h: String },
    Circle { x: String, y: String, r: String },
    Line { x1: String, y1: String, x2: String, y2: String },
    Text { x: String, y: String, expr: String },
    Font { expr: String },

    // Keyboard
    OnKey { phase: KeyPhase, key: String, stmt: String },
    Key { key: String, into: String },

    // Storage
    Store { key: String, expr: String },
    Load { key: String, into: String },
    Delete { key: String },
    Keys { into: String },

    // Network
    Fetch { url: String, into: String },
    FetchJson { url: String, into: String },

    // Sound
    Beep { freq: u32, millis: u64 },
    PlayAudio { url: String },

    // Entities
    EntityNew { into: String },
    CompSet { entity: String, component: String, value: String },
    CompGet { entity: String, component: String, into: String },
    CompHas { entity: String, component: String, into: String },
    CompDel { entity: String, component: String },
}
