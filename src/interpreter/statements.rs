//! Statement execution handlers
//!
//! `execute` performs the effect of one classified statement and reports
//! what the stream should do next. Block headers only evaluate what they
//! need (IF condition, FOR bounds) and return `EnterBlock`; extent
//! resolution and scheduling belong to the stream runner.
//!
//! Only a handful of statements suspend (CALL, SLEEP and the blocking host
//! calls). Everything else is handled synchronously in `execute_now` under
//! the run's statement gate, so it runs to completion before any other
//! stream's statement starts.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::errors::RuntimeError;
use super::exec_loop::Stream;
use super::functions;
use super::scheduler;
use super::types::{ArithOp, Block, Control, Stmt, Val};

/* ===================== Helpers ===================== */

/// Evaluate expression text against the stream's scope
pub fn evaluate(stream: &Stream, text: &str) -> Result<Val, RuntimeError> {
    stream
        .ctx
        .host
        .evaluator
        .evaluate(text, stream.scope.as_ref())
        .map_err(|source| RuntimeError::BadExpression {
            expr: text.to_string(),
            source,
        })
}

/// `evaluate` for the suspending statements, which do not hold the gate
fn evaluate_gated(stream: &Stream, text: &str) -> Result<Val, RuntimeError> {
    let _gate = stream.ctx.statement_gate();
    evaluate(stream, text)
}

fn evaluate_number(stream: &Stream, text: &str) -> Result<f64, RuntimeError> {
    Ok(evaluate(stream, text)?.to_number())
}

/// Entity ids are written either literally or as a variable
fn entity_id(stream: &Stream, text: &str) -> Result<u64, RuntimeError> {
    if let Ok(id) = text.parse::<u64>() {
        return Ok(id);
    }
    match stream.scope.get(text)? {
        Val::Num(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
        other => Err(RuntimeError::type_mismatch(format!(
            "{} is not an entity id ({})",
            text,
            other.type_name()
        ))),
    }
}

fn apply_arith(op: ArithOp, name: &str, current: Val, amount: Val) -> Result<Val, RuntimeError> {
    if op == ArithOp::Add {
        if let (Val::Str(_), _) | (_, Val::Str(_)) = (&current, &amount) {
            return Ok(Val::Str(format!("{}{}", current, amount)));
        }
    }

    let (Some(a), Some(b)) = (current.as_number(), amount.as_number()) else {
        return Err(RuntimeError::type_mismatch(format!(
            "{:?} needs numbers, {} is {} and the amount is {}",
            op,
            name,
            current.type_name(),
            amount.type_name()
        )));
    };

    // IEEE semantics: x / 0 is infinite, x % 0 is NaN
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    };
    Ok(Val::Num(result))
}

fn length_of(name: &str, value: &Val) -> Result<usize, RuntimeError> {
    match value {
        Val::List(items) => Ok(items.len()),
        Val::Str(s) => Ok(s.chars().count()),
        Val::Obj(map) => Ok(map.len()),
        Val::Null | Val::Undefined => Ok(0),
        other => Err(RuntimeError::type_mismatch(format!(
            "LEN of {} ({})",
            name,
            other.type_name()
        ))),
    }
}

fn record_of(name: &str, value: Val) -> Result<HashMap<String, Val>, RuntimeError> {
    match value {
        Val::Obj(map) => Ok(map),
        Val::Null | Val::Undefined => Ok(HashMap::new()),
        other => Err(RuntimeError::type_mismatch(format!(
            "{} is {}, not a record",
            name,
            other.type_name()
        ))),
    }
}

/// Run a blocking host call off the scheduler
async fn blocking<T, F>(command: &'static str, f: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::host(command, e))?
        .map_err(|e| RuntimeError::host(command, e))
}

/* ===================== Dispatcher ===================== */

/// Execute one statement
pub async fn execute(stmt: &Stmt, stream: &Stream) -> Result<Control, RuntimeError> {
    let ctx = &stream.ctx;
    let scope = &stream.scope;

    match stmt {
        Stmt::Call { name, args, into } => {
            let args = {
                let _gate = ctx.statement_gate();
                args.iter()
                    .map(|arg| evaluate(stream, arg))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let result = functions::call(stream, name, args).await?;
            if let Some(into) = into {
                scope.set(into, result)?;
            }
            Ok(Control::Normal)
        }

        Stmt::Sleep { millis } => {
            ctx.sleep(Duration::from_millis(*millis)).await;
            Ok(Control::Normal)
        }

        Stmt::Alert { expr } => {
            let text = evaluate_gated(stream, expr)?.to_string();
            let dialog = ctx.host.dialog.clone();
            blocking("ALERT", move || dialog.alert(&text)).await?;
            Ok(Control::Normal)
        }

        Stmt::Input { prompt, into } => {
            let prompt = evaluate_gated(stream, prompt)?.to_string();
            let dialog = ctx.host.dialog.clone();
            let answer = blocking("INPUT", move || dialog.prompt(&prompt)).await?;
            scope.set(into, answer.map(Val::Str).unwrap_or(Val::Null))?;
            Ok(Control::Normal)
        }

        Stmt::Fetch { url, into } => {
            let network = ctx.host.network.clone();
            let target = url.clone();
            let body = blocking("FETCH", move || network.fetch_text(&target)).await?;
            scope.set(into, Val::Str(body))?;
            Ok(Control::Normal)
        }

        Stmt::FetchJson { url, into } => {
            let network = ctx.host.network.clone();
            let target = url.clone();
            let json = blocking("FETCHJSON", move || network.fetch_json(&target)).await?;
            scope.set(into, Val::from(json))?;
            Ok(Control::Normal)
        }

        _ => {
            let _gate = ctx.statement_gate();
            // HALT may have landed while this stream waited for the gate
            if ctx.is_halted() {
                return Ok(Control::Normal);
            }
            execute_now(stmt, stream)
        }
    }
}

/// Statements that never suspend
fn execute_now(stmt: &Stmt, stream: &Stream) -> Result<Control, RuntimeError> {
    let ctx = &stream.ctx;
    let scope = &stream.scope;

    match stmt {
        /* ---------- Declarations & variables ---------- */
        Stmt::Set { name, expr } => {
            scope.set(name, evaluate(stream, expr)?)?;
        }
        Stmt::Const { name, expr } => {
            scope.declare_const(name, evaluate(stream, expr)?)?;
        }
        Stmt::Alias { alias, target } => {
            let value = scope.lookup(target).unwrap_or_default();
            scope.set(alias, value)?;
        }
        Stmt::Declare { kind, body } => {
            debug!(?kind, body = %body, "declaration");
        }

        /* ---------- Math & random ---------- */
        Stmt::Arith { op, name, expr } => {
            let current = scope.get(name)?;
            let amount = evaluate(stream, expr)?;
            scope.set(name, apply_arith(*op, name, current, amount)?)?;
        }
        Stmt::Random { min, max, into } => {
            let min = evaluate_number(stream, min)?;
            let max = evaluate_number(stream, max)?;
            let roll: f64 = rand::thread_rng().gen();
            scope.set(into, Val::Num(roll * (max - min) + min))?;
        }
        Stmt::Math { func, expr, into } => {
            let value = evaluate(stream, &format!("{}({})", func, expr))?;
            scope.set(into, value)?;
        }

        /* ---------- Blocks ---------- */
        Stmt::If { cond } => {
            let taken = evaluate(stream, cond)?.is_truthy();
            return Ok(Control::EnterBlock(Block::If { taken }));
        }
        Stmt::While { cond } => {
            return Ok(Control::EnterBlock(Block::While { cond: cond.clone() }));
        }
        Stmt::For {
            var,
            from,
            to,
            step,
        } => {
            let from = evaluate_number(stream, from)?;
            let to = evaluate_number(stream, to)?;
            let step = match step {
                Some(step) => evaluate_number(stream, step)?,
                None => 1.0,
            };
            return Ok(Control::EnterBlock(Block::For {
                var: var.clone(),
                from,
                to,
                step,
            }));
        }
        Stmt::Function { name, params } => {
            return Ok(Control::EnterBlock(Block::Function {
                name: name.clone(),
                params: params.clone(),
            }));
        }
        Stmt::Return { expr } => {
            let value = match expr {
                Some(expr) => evaluate(stream, expr)?,
                None => Val::Null,
            };
            return Ok(Control::Return(value));
        }
        // Structure lines are consumed by the stream runner
        Stmt::Else | Stmt::EndIf | Stmt::Terminator(_) => {}

        /* ---------- Lists & records ---------- */
        Stmt::Array { name, literal } => match evaluate(stream, literal)? {
            list @ Val::List(_) => {
                scope.set(name, list)?;
            }
            other => {
                return Err(RuntimeError::type_mismatch(format!(
                    "ARRAY {} needs a list, got {}",
                    name,
                    other.type_name()
                )))
            }
        },
        Stmt::Push { expr, into } => {
            let value = evaluate(stream, expr)?;
            scope.with_value_mut(into, |target| match target {
                Val::List(items) => {
                    items.push(value);
                    Ok(())
                }
                other => Err(RuntimeError::type_mismatch(format!(
                    "PUSH into {} ({})",
                    into,
                    other.type_name()
                ))),
            })?;
        }
        Stmt::Pop { source, into } => {
            let popped = scope.with_value_mut(source, |target| match target {
                Val::List(items) => Ok(items.pop().unwrap_or_default()),
                other => Err(RuntimeError::type_mismatch(format!(
                    "POP from {} ({})",
                    source,
                    other.type_name()
                ))),
            })?;
            scope.set(into, popped)?;
        }
        Stmt::Len { source, into } => {
            let len = length_of(source, &scope.get(source)?)?;
            scope.set(into, Val::Num(len as f64))?;
        }
        Stmt::Object { name, literal } => match evaluate(stream, literal)? {
            record @ Val::Obj(_) => {
                scope.set(name, record)?;
            }
            other => {
                return Err(RuntimeError::type_mismatch(format!(
                    "OBJECT {} needs a record, got {}",
                    name,
                    other.type_name()
                )))
            }
        },
        Stmt::SetField {
            object,
            field,
            expr,
        } => {
            let value = evaluate(stream, expr)?;
            scope.with_value_mut(object, |target| match target {
                Val::Obj(map) => {
                    map.insert(field.clone(), value);
                    Ok(())
                }
                other => Err(RuntimeError::type_mismatch(format!(
                    "SETFIELD on {} ({})",
                    object,
                    other.type_name()
                ))),
            })?;
        }
        Stmt::GetField {
            object,
            field,
            into,
        } => {
            let value = scope.get(object)?.field(field);
            scope.set(into, value)?;
        }
        Stmt::Merge { left, right, into } => {
            let mut merged = record_of(left, scope.get(left)?)?;
            merged.extend(record_of(right, scope.get(right)?)?);
            scope.set(into, Val::Obj(merged))?;
        }

        /* ---------- I/O & debug ---------- */
        Stmt::Print { expr } => {
            let value = evaluate(stream, expr)?;
            ctx.output(&value.to_string());
        }
        Stmt::Trace { on } => ctx.set_trace(*on),

        /* ---------- Time & timers ---------- */
        Stmt::TimeNow { into } => {
            let now = chrono::Utc::now().timestamp_millis();
            scope.set(into, Val::Num(now as f64))?;
        }
        Stmt::Every { millis, name } => {
            return Ok(Control::EnterBlock(Block::Every {
                period: Duration::from_millis(*millis),
                name: name.clone(),
            }));
        }
        Stmt::Tick { millis, name } => {
            return Ok(Control::EnterBlock(Block::Tick {
                delay: Duration::from_millis(*millis),
                name: name.clone(),
            }));
        }
        Stmt::Cancel { name } => {
            if !ctx.tasks.cancel_named(name) {
                debug!(timer = %name, "CANCEL of unknown timer");
            }
        }
        Stmt::Halt => ctx.halt(),

        /* ---------- Drawing ---------- */
        Stmt::CanvasSize { width, height } => {
            let surface = ctx.surface.as_ref().ok_or(RuntimeError::MissingSurface)?;
            surface.resize(*width, *height);
        }
        Stmt::Color { expr } => {
            let color = evaluate(stream, expr)?.to_string();
            ctx.set_color(color);
        }
        Stmt::Clear => {
            if let Some(surface) = &ctx.surface {
                surface.clear();
            }
        }
        Stmt::Rect { x, y, w, h } => {
            let (x, y) = (evaluate_number(stream, x)?, evaluate_number(stream, y)?);
            let (w, h) = (evaluate_number(stream, w)?, evaluate_number(stream, h)?);
            if let Some(surface) = &ctx.surface {
                surface.fill_rect(&ctx.color(), x, y, w, h);
            }
        }
        Stmt::Circle { x, y, r } => {
            let (x, y) = (evaluate_number(stream, x)?, evaluate_number(stream, y)?);
            let r = evaluate_number(stream, r)?;
            if let Some(surface) = &ctx.surface {
                surface.fill_circle(&ctx.color(), x, y, r);
            }
        }
        Stmt::Line { x1, y1, x2, y2 } => {
            let (x1, y1) = (evaluate_number(stream, x1)?, evaluate_number(stream, y1)?);
            let (x2, y2) = (evaluate_number(stream, x2)?, evaluate_number(stream, y2)?);
            if let Some(surface) = &ctx.surface {
                surface.stroke_line(&ctx.color(), x1, y1, x2, y2);
            }
        }
        Stmt::Text { x, y, expr } => {
            let (x, y) = (evaluate_number(stream, x)?, evaluate_number(stream, y)?);
            let text = evaluate(stream, expr)?.to_string();
            if let Some(surface) = &ctx.surface {
                surface.fill_text(&ctx.color(), x, y, &text);
            }
        }
        Stmt::Font { expr } => {
            let font = evaluate(stream, expr)?.to_string();
            if let Some(surface) = &ctx.surface {
                surface.set_font(&font);
            }
        }

        /* ---------- Keyboard ---------- */
        Stmt::OnKey { phase, key, stmt } => {
            scheduler::spawn_key_handler(stream, *phase, key.clone(), stmt.clone());
        }
        Stmt::Key { key, into } => {
            let down = ctx.host.keyboard.is_key_down(key);
            scope.set(into, Val::Bool(down))?;
        }

        /* ---------- Storage ---------- */
        Stmt::Store { key, expr } => {
            let value = evaluate(stream, expr)?;
            let json = value.to_json().to_string();
            ctx.host
                .storage
                .put(key, &json)
                .map_err(|e| RuntimeError::host("STORE", e))?;
        }
        Stmt::Load { key, into } => {
            let raw = ctx
                .host
                .storage
                .get(key)
                .map_err(|e| RuntimeError::host("LOAD", e))?;
            let value = match raw {
                None => Val::Null,
                Some(text) => match serde_json::from_str::<JsonValue>(&text) {
                    Ok(json) => Val::from(json),
                    Err(_) => Val::Str(text),
                },
            };
            scope.set(into, value)?;
        }
        Stmt::Delete { key } => {
            ctx.host
                .storage
                .delete(key)
                .map_err(|e| RuntimeError::host("DELETE", e))?;
        }
        Stmt::Keys { into } => {
            let keys = ctx
                .host
                .storage
                .keys()
                .map_err(|e| RuntimeError::host("KEYS", e))?;
            scope.set(into, Val::List(keys.into_iter().map(Val::Str).collect()))?;
        }

        /* ---------- Sound ---------- */
        Stmt::Beep { freq, millis } => {
            ctx.host
                .audio
                .play_tone(*freq, *millis)
                .map_err(|e| RuntimeError::host("BEEP", e))?;
        }
        Stmt::PlayAudio { url } => {
            ctx.host
                .audio
                .play_clip(url)
                .map_err(|e| RuntimeError::host("PLAYAUDIO", e))?;
        }

        /* ---------- Entities ---------- */
        Stmt::EntityNew { into } => {
            let id = ctx.entities().new_entity();
            scope.set(into, Val::Num(id as f64))?;
        }
        Stmt::CompSet {
            entity,
            component,
            value,
        } => {
            let id = entity_id(stream, entity)?;
            let value = match serde_json::from_str::<JsonValue>(value) {
                Ok(json) => Val::from(json),
                Err(_) => evaluate(stream, value)?,
            };
            ctx.entities().set_component(id, component, value);
        }
        Stmt::CompGet {
            entity,
            component,
            into,
        } => {
            let id = entity_id(stream, entity)?;
            let value = ctx.entities().get_component(id, component);
            scope.set(into, value)?;
        }
        Stmt::CompHas {
            entity,
            component,
            into,
        } => {
            let id = entity_id(stream, entity)?;
            let has = ctx.entities().has_component(id, component);
            scope.set(into, Val::Bool(has))?;
        }
        Stmt::CompDel { entity, component } => {
            let id = entity_id(stream, entity)?;
            ctx.entities().delete_component(id, component);
        }

        // Suspending statements are handled by `execute`
        Stmt::Call { .. }
        | Stmt::Sleep { .. }
        | Stmt::Alert { .. }
        | Stmt::Input { .. }
        | Stmt::Fetch { .. }
        | Stmt::FetchJson { .. } => {}
    }

    Ok(Control::Normal)
}
