use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use crate::libs::blockset::BlockSet;
use crate::libs::error::{PangeneError, Result};

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Str(String),
    List(Vec<String>),
}

impl OptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptValue::Bool(_) => "bool",
            OptValue::Int(_) => "int",
            OptValue::Decimal(_) => "decimal",
            OptValue::Str(_) => "string",
            OptValue::List(_) => "list",
        }
    }

    /// Parse `text` as a value of the same type as `self`.
    fn parse_like(&self, name: &str, text: &str) -> Result<OptValue> {
        let bad = || {
            PangeneError::Option(format!(
                "option {} expects a {} value, got '{}'",
                name,
                self.type_name(),
                text
            ))
        };
        Ok(match self {
            OptValue::Bool(_) => match text {
                "true" | "1" | "yes" => OptValue::Bool(true),
                "false" | "0" | "no" => OptValue::Bool(false),
                _ => return Err(bad()),
            },
            OptValue::Int(_) => OptValue::Int(text.parse().map_err(|_| bad())?),
            OptValue::Decimal(_) => OptValue::Decimal(text.parse().map_err(|_| bad())?),
            OptValue::Str(_) => OptValue::Str(text.to_string()),
            OptValue::List(_) => {
                OptValue::List(text.split(',').map(|s| s.to_string()).collect())
            }
        })
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            OptValue::Int(v) => Some(*v as f64),
            OptValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum OptDefault {
    Value(OptValue),
    /// `$NAME`: read from the Meta registry lazily, at each read.
    Global(String),
}

#[derive(Debug, Clone)]
struct Opt {
    help: String,
    /// Sample value fixing the option's type.
    kind: OptValue,
    default: OptDefault,
    value: Option<OptValue>,
    required: bool,
    ignored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RuleOp {
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone)]
enum RuleRhs {
    Option(String),
    Literal(f64),
}

#[derive(Debug, Clone)]
struct Rule {
    left: String,
    op: RuleOp,
    rhs: RuleRhs,
    text: String,
}

pub type Validator =
    Box<dyn Fn(&Options, &Meta) -> std::result::Result<(), String> + Send + Sync>;

/// Typed option table of a processor.
#[derive(Default)]
pub struct Options {
    opts: IndexMap<String, Opt>,
    rules: Vec<Rule>,
    validators: Vec<Validator>,
}

impl Options {
    /// Fresh table carrying the options every processor understands.
    pub fn new() -> Self {
        let mut options = Options::default();
        options.add_global("workers", "Number of worker threads, -1 for all cores", OptValue::Int(1), "WORKERS");
        options.add("timing", "Log the time spent by this processor", OptValue::Bool(false));
        options
    }

    /// Declare an option with a literal default.
    pub fn add(&mut self, name: &str, help: &str, default: OptValue) {
        self.opts.insert(
            name.to_string(),
            Opt {
                help: help.to_string(),
                kind: default.clone(),
                default: OptDefault::Value(default),
                value: None,
                required: false,
                ignored: false,
            },
        );
    }

    /// Declare an option whose default is `$GLOBAL` in the Meta registry.
    pub fn add_global(&mut self, name: &str, help: &str, kind: OptValue, global: &str) {
        self.opts.insert(
            name.to_string(),
            Opt {
                help: help.to_string(),
                kind,
                default: OptDefault::Global(global.to_string()),
                value: None,
                required: false,
                ignored: false,
            },
        );
    }

    pub fn set_required(&mut self, name: &str) {
        if let Some(opt) = self.opts.get_mut(name) {
            opt.required = true;
        }
    }

    pub fn set_ignored(&mut self, name: &str) {
        if let Some(opt) = self.opts.get_mut(name) {
            opt.ignored = true;
        }
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.opts.get(name).map(|o| o.ignored).unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        self.opts.keys().cloned().collect()
    }

    pub fn help_of(&self, name: &str) -> Option<&str> {
        self.opts.get(name).map(|o| o.help.as_str())
    }

    /// Set from text, parsed according to the declared type.
    pub fn set(&mut self, name: &str, text: &str) -> Result<()> {
        let opt = self
            .opts
            .get_mut(name)
            .ok_or_else(|| PangeneError::Option(format!("unknown option {}", name)))?;
        opt.value = Some(opt.kind.parse_like(name, text)?);
        Ok(())
    }

    /// Set a typed value; the type must match the declaration.
    pub fn set_value(&mut self, name: &str, value: OptValue) -> Result<()> {
        let opt = self
            .opts
            .get_mut(name)
            .ok_or_else(|| PangeneError::Option(format!("unknown option {}", name)))?;
        if std::mem::discriminant(&opt.kind) != std::mem::discriminant(&value) {
            return Err(PangeneError::Option(format!(
                "option {} expects a {} value, got {}",
                name,
                opt.kind.type_name(),
                value.type_name()
            )));
        }
        opt.value = Some(value);
        Ok(())
    }

    /// Resolved value: explicit value, else default; `$NAME` defaults
    /// read the registry at each call.
    pub fn value(&self, name: &str, meta: &Meta) -> Result<OptValue> {
        let opt = self
            .opts
            .get(name)
            .ok_or_else(|| PangeneError::Option(format!("unknown option {}", name)))?;
        if let Some(v) = &opt.value {
            return Ok(v.clone());
        }
        match &opt.default {
            OptDefault::Value(v) => Ok(v.clone()),
            OptDefault::Global(global) => {
                let text = meta.get(global).ok_or_else(|| {
                    PangeneError::Option(format!(
                        "option {} reads ${} which is not in the registry",
                        name, global
                    ))
                })?;
                opt.kind.parse_like(name, &text)
            }
        }
    }

    pub fn bool_(&self, name: &str, meta: &Meta) -> Result<bool> {
        match self.value(name, meta)? {
            OptValue::Bool(v) => Ok(v),
            v => Err(type_error(name, "bool", &v)),
        }
    }

    pub fn int_(&self, name: &str, meta: &Meta) -> Result<i64> {
        match self.value(name, meta)? {
            OptValue::Int(v) => Ok(v),
            v => Err(type_error(name, "int", &v)),
        }
    }

    pub fn decimal_(&self, name: &str, meta: &Meta) -> Result<f64> {
        match self.value(name, meta)? {
            OptValue::Decimal(v) => Ok(v),
            OptValue::Int(v) => Ok(v as f64),
            v => Err(type_error(name, "decimal", &v)),
        }
    }

    pub fn str_(&self, name: &str, meta: &Meta) -> Result<String> {
        match self.value(name, meta)? {
            OptValue::Str(v) => Ok(v),
            v => Err(type_error(name, "string", &v)),
        }
    }

    pub fn list_(&self, name: &str, meta: &Meta) -> Result<Vec<String>> {
        match self.value(name, meta)? {
            OptValue::List(v) => Ok(v),
            v => Err(type_error(name, "list", &v)),
        }
    }

    /// Declare a numeric cross-option rule of the form
    /// `"<left> <op> <right>"` with `op` in `<`, `>`, `<=`, `>=`;
    /// the right side is an option name or a numeric literal.
    pub fn add_rule(&mut self, text: &str) {
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words.len(), 3, "bad option rule '{}'", text);
        let op = match words[1] {
            "<" => RuleOp::Lt,
            ">" => RuleOp::Gt,
            "<=" => RuleOp::Le,
            ">=" => RuleOp::Ge,
            other => panic!("bad rule operator '{}'", other),
        };
        let rhs = match words[2].parse::<f64>() {
            Ok(v) => RuleRhs::Literal(v),
            Err(_) => RuleRhs::Option(words[2].to_string()),
        };
        self.rules.push(Rule {
            left: words[0].to_string(),
            op,
            rhs,
            text: text.to_string(),
        });
    }

    pub fn add_validator(&mut self, v: Validator) {
        self.validators.push(v);
    }

    /// Apply argv-style tokens: `--name value`, `--name=value` and bare
    /// boolean flags. Unknown flags are ignored unless `strict`.
    pub fn apply_vector_options(&mut self, tokens: &[String], strict: bool) -> Result<()> {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let Some(stripped) = token.strip_prefix("--") else {
                if strict {
                    return Err(PangeneError::Option(format!("unexpected token '{}'", token)));
                }
                i += 1;
                continue;
            };
            let (name, inline_value) = match stripped.split_once('=') {
                Some((n, v)) => (n.to_string(), Some(v.to_string())),
                None => (stripped.to_string(), None),
            };
            if !self.opts.contains_key(&name) {
                if strict {
                    return Err(PangeneError::Option(format!("unknown option --{}", name)));
                }
                // skip an unknown flag and a value that may follow it
                if inline_value.is_none()
                    && i + 1 < tokens.len()
                    && !tokens[i + 1].starts_with("--")
                {
                    i += 1;
                }
                i += 1;
                continue;
            }
            if self.is_ignored(&name) {
                if inline_value.is_none()
                    && i + 1 < tokens.len()
                    && !tokens[i + 1].starts_with("--")
                {
                    i += 1;
                }
                i += 1;
                continue;
            }
            let is_bool = matches!(self.opts[&name].kind, OptValue::Bool(_));
            let value = match inline_value {
                Some(v) => v,
                None if is_bool => {
                    // a bool flag may stand alone
                    if i + 1 < tokens.len() && !tokens[i + 1].starts_with("--") {
                        i += 1;
                        tokens[i].clone()
                    } else {
                        "true".to_string()
                    }
                }
                None => {
                    i += 1;
                    tokens
                        .get(i)
                        .cloned()
                        .ok_or_else(|| {
                            PangeneError::Option(format!("option --{} misses its value", name))
                        })?
                }
            };
            self.set(&name, &value)?;
            i += 1;
        }
        Ok(())
    }

    /// Check required options, rules and custom validators.
    pub fn validate(&self, meta: &Meta) -> Result<()> {
        for (name, opt) in &self.opts {
            if opt.required && opt.value.is_none() {
                return Err(PangeneError::Option(format!(
                    "required option {} is not set",
                    name
                )));
            }
        }
        for rule in &self.rules {
            let left = self
                .value(&rule.left, meta)?
                .numeric()
                .ok_or_else(|| {
                    PangeneError::Option(format!("rule '{}' on non-numeric option", rule.text))
                })?;
            let right = match &rule.rhs {
                RuleRhs::Literal(v) => *v,
                RuleRhs::Option(name) => self.value(name, meta)?.numeric().ok_or_else(|| {
                    PangeneError::Option(format!("rule '{}' on non-numeric option", rule.text))
                })?,
            };
            let holds = match rule.op {
                RuleOp::Lt => left < right,
                RuleOp::Gt => left > right,
                RuleOp::Le => left <= right,
                RuleOp::Ge => left >= right,
            };
            if !holds {
                return Err(PangeneError::Option(format!(
                    "option rule violated: {} ({} vs {})",
                    rule.text, left, right
                )));
            }
        }
        for v in &self.validators {
            v(self, meta).map_err(PangeneError::Option)?;
        }
        Ok(())
    }
}

fn type_error(name: &str, wanted: &str, got: &OptValue) -> PangeneError {
    PangeneError::Option(format!(
        "option {} holds a {} value, not {}",
        name,
        got.type_name(),
        wanted
    ))
}

/// Process-wide registry of named configuration values, referenced from
/// option defaults as `$NAME`. When embedded, pass an explicit instance
/// instead of relying on ambient state.
#[derive(Debug, Clone)]
pub struct Meta {
    globals: BTreeMap<String, String>,
}

impl Default for Meta {
    fn default() -> Self {
        let mut globals = BTreeMap::new();
        globals.insert("WORKERS".to_string(), "1".to_string());
        globals.insert("ANCHOR_SIZE".to_string(), "20".to_string());
        globals.insert("MIN_LENGTH".to_string(), "100".to_string());
        globals.insert("MIN_IDENTITY".to_string(), "0.9".to_string());
        globals.insert("MAX_SPREADING".to_string(), "0.2".to_string());
        Meta { globals }
    }
}

impl Meta {
    pub fn new() -> Self {
        Meta::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.globals.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.globals.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.globals.keys().cloned().collect()
    }

    /// Override known globals from same-named environment variables.
    pub fn load_env(&mut self) {
        let names = self.names();
        for name in names {
            if let Ok(value) = std::env::var(&name) {
                self.set(&name, &value);
            }
        }
    }

    /// Read `NAME = value` lines; `#` starts a comment.
    pub fn load_config(&mut self, reader: &mut dyn BufRead, file: &str) -> Result<()> {
        let mut line_no = 0;
        for line in reader.lines() {
            let line = line?;
            line_no += 1;
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once('=').ok_or_else(|| PangeneError::Parse {
                file: file.to_string(),
                line: line_no,
                message: "expected NAME = value".to_string(),
            })?;
            self.set(name.trim(), value.trim());
        }
        Ok(())
    }

    /// Apply `NAME=VALUE` assignments from the command line.
    pub fn apply_sets(&mut self, sets: &[String]) -> Result<()> {
        for assignment in sets {
            let (name, value) = assignment.split_once('=').ok_or_else(|| {
                PangeneError::Option(format!("bad --set '{}', expected NAME=VALUE", assignment))
            })?;
            self.set(name.trim(), value.trim());
        }
        Ok(())
    }
}

/// Shared state a processor runs against: the registry, the named block
/// sets and the interrupt flag.
pub struct Context {
    pub meta: Meta,
    block_sets: BTreeMap<String, BlockSet>,
    interrupted: Arc<AtomicBool>,
}

impl Context {
    pub fn new(meta: Meta) -> Self {
        Context {
            meta,
            block_sets: BTreeMap::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_bs(&mut self, name: &str, bs: BlockSet) {
        self.block_sets.insert(name.to_string(), bs);
    }

    pub fn bs(&self, name: &str) -> Result<&BlockSet> {
        self.block_sets
            .get(name)
            .ok_or_else(|| PangeneError::Option(format!("no blockset named '{}'", name)))
    }

    pub fn bs_mut(&mut self, name: &str) -> Result<&mut BlockSet> {
        self.block_sets
            .get_mut(name)
            .ok_or_else(|| PangeneError::Option(format!("no blockset named '{}'", name)))
    }

    pub fn take_bs(&mut self, name: &str) -> Result<BlockSet> {
        self.block_sets
            .remove(name)
            .ok_or_else(|| PangeneError::Option(format!("no blockset named '{}'", name)))
    }

    pub fn has_bs(&self, name: &str) -> bool {
        self.block_sets.contains_key(name)
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn check_interrupt(&self) -> Result<()> {
        if self.interrupted.load(Ordering::SeqCst) {
            Err(PangeneError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// A named transformation of block sets. Processors read and write the
/// context's named slots, `target` and `other` at minimum.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    fn options(&self) -> &Options;

    fn options_mut(&mut self) -> &mut Options;

    /// Declared block-set slots as `(slot, description)` pairs.
    fn declared_slots(&self) -> Vec<(&'static str, &'static str)> {
        vec![("target", "Target blockset")]
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()>;
}

/// Validate options and run one processor with interrupt and timing
/// bookkeeping.
pub fn run_processor(p: &dyn Processor, ctx: &mut Context) -> Result<()> {
    ctx.check_interrupt()?;
    p.options().validate(&ctx.meta)?;
    let started = Instant::now();
    log::debug!("{}: start", p.name());
    p.run_impl(ctx)?;
    let elapsed = started.elapsed();
    if p.options().bool_("timing", &ctx.meta)? {
        log::info!("{}: {:.3}s", p.name(), elapsed.as_secs_f64());
    } else {
        log::debug!("{}: done in {:.3}s", p.name(), elapsed.as_secs_f64());
    }
    Ok(())
}

/// Runs child processors in order, checking the interrupt flag between
/// them.
pub struct Pipe {
    name: &'static str,
    options: Options,
    children: Vec<Box<dyn Processor>>,
}

impl Pipe {
    pub fn new(name: &'static str) -> Self {
        Pipe {
            name,
            options: Options::new(),
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, child: Box<dyn Processor>) -> &mut Self {
        self.children.push(child);
        self
    }

    pub fn children(&self) -> &[Box<dyn Processor>] {
        &self.children
    }

    /// Mark an option as ignored here and in every descendant.
    pub fn add_ignored_option(&mut self, name: &str) {
        self.options.set_ignored(name);
        for child in &mut self.children {
            child.options_mut().set_ignored(name);
        }
    }

    /// Push argv-style overrides down to every child; unknown names are
    /// skipped per child.
    pub fn apply_to_children(&mut self, tokens: &[String]) -> Result<()> {
        for child in &mut self.children {
            child.options_mut().apply_vector_options(tokens, false)?;
        }
        Ok(())
    }

    /// Indented tree of this pipe, for `--tree`-style listings.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        out.push_str(self.name);
        out.push('\n');
        for child in &self.children {
            out.push_str(&format!("  {}\n", child.name()));
        }
        out
    }
}

impl Processor for Pipe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn run_impl(&self, ctx: &mut Context) -> Result<()> {
        for child in &self.children {
            ctx.check_interrupt()?;
            run_processor(&**child, ctx)?;
        }
        Ok(())
    }
}

/// Temporary files created by a processor, deleted when the set is
/// dropped unless `keep` is on.
#[derive(Default)]
pub struct TempFiles {
    keep: bool,
    files: Vec<tempfile::TempPath>,
    kept: Vec<PathBuf>,
}

impl TempFiles {
    pub fn new(keep: bool) -> Self {
        TempFiles {
            keep,
            ..TempFiles::default()
        }
    }

    /// Create a tracked temporary file and return its path.
    pub fn create(&mut self) -> Result<PathBuf> {
        let file = tempfile::NamedTempFile::new().map_err(PangeneError::Io)?;
        let path = file.into_temp_path();
        let buf = path.to_path_buf();
        if self.keep {
            self.kept.push(path.keep().map_err(|e| {
                PangeneError::Io(std::io::Error::other(e))
            })?);
        } else {
            self.files.push(path);
        }
        Ok(buf)
    }

    pub fn kept(&self) -> &[PathBuf] {
        &self.kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Options {
        let mut options = Options::new();
        options.add("min-fragment", "Minimal fragment length", OptValue::Int(100));
        options.add("max-fragment", "Maximal fragment length", OptValue::Int(-1));
        options.add("min-identity", "Minimal identity", OptValue::Decimal(0.9));
        options.add("label", "Free text", OptValue::Str("x".to_string()));
        options.add("no-palindromes", "Eliminate palindromes", OptValue::Bool(true));
        options.add_global("anchor-size", "Anchor length", OptValue::Int(0), "ANCHOR_SIZE");
        options
    }

    #[test]
    fn defaults_and_overrides() {
        let meta = Meta::new();
        let mut options = table();
        assert_eq!(options.int_("min-fragment", &meta).unwrap(), 100);
        options.set("min-fragment", "25").unwrap();
        assert_eq!(options.int_("min-fragment", &meta).unwrap(), 25);
        assert!(options.set("min-fragment", "abc").is_err());
        assert!(options.set("nonexistent", "1").is_err());
    }

    #[test]
    fn global_defaults_resolve_lazily() {
        let mut meta = Meta::new();
        let options = table();
        assert_eq!(options.int_("anchor-size", &meta).unwrap(), 20);
        meta.set("ANCHOR_SIZE", "11");
        assert_eq!(options.int_("anchor-size", &meta).unwrap(), 11);
    }

    #[test]
    fn vector_options_parse_argv_tokens() {
        let meta = Meta::new();
        let mut options = table();
        let tokens: Vec<String> = [
            "--min-fragment",
            "10",
            "--min-identity=0.5",
            "--no-palindromes",
            "false",
            "--unknown-flag",
            "7",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        options.apply_vector_options(&tokens, false).unwrap();
        assert_eq!(options.int_("min-fragment", &meta).unwrap(), 10);
        assert!((options.decimal_("min-identity", &meta).unwrap() - 0.5).abs() < 1e-9);
        assert!(!options.bool_("no-palindromes", &meta).unwrap());

        let mut strict = table();
        assert!(strict.apply_vector_options(&tokens, true).is_err());
    }

    #[test]
    fn rules_compare_numeric_options() {
        let meta = Meta::new();
        let mut options = table();
        options.add_rule("min-fragment <= max-fragment");
        options.set("max-fragment", "200").unwrap();
        assert!(options.validate(&meta).is_ok());
        options.set("max-fragment", "50").unwrap();
        let err = options.validate(&meta).unwrap_err();
        assert!(err.to_string().contains("min-fragment <= max-fragment"));

        let mut literal = table();
        literal.add_rule("min-identity >= 0.5");
        literal.set("min-identity", "0.4").unwrap();
        assert!(literal.validate(&meta).is_err());
    }

    #[test]
    fn required_and_ignored() {
        let meta = Meta::new();
        let mut options = table();
        options.set_required("label");
        assert!(options.validate(&meta).is_err());
        options.set("label", "pangenome").unwrap();
        assert!(options.validate(&meta).is_ok());

        options.set_ignored("min-fragment");
        let tokens: Vec<String> = ["--min-fragment", "7"].iter().map(|s| s.to_string()).collect();
        options.apply_vector_options(&tokens, false).unwrap();
        assert_eq!(options.int_("min-fragment", &meta).unwrap(), 100);
    }

    #[test]
    fn meta_precedence_layers() {
        let mut meta = Meta::new();
        assert_eq!(meta.get("MIN_LENGTH").unwrap(), "100");
        let mut config = std::io::BufReader::new(&b"MIN_LENGTH = 60 # shorter\n\nANCHOR_SIZE=15\n"[..]);
        meta.load_config(&mut config, "pangene.conf").unwrap();
        assert_eq!(meta.get("MIN_LENGTH").unwrap(), "60");
        meta.apply_sets(&["MIN_LENGTH=30".to_string()]).unwrap();
        assert_eq!(meta.get("MIN_LENGTH").unwrap(), "30");
        assert!(meta.apply_sets(&["BAD".to_string()]).is_err());
    }

    #[test]
    fn context_interrupt_unwinds() {
        let ctx = Context::new(Meta::new());
        assert!(ctx.check_interrupt().is_ok());
        ctx.interrupt();
        assert!(matches!(
            ctx.check_interrupt().unwrap_err(),
            PangeneError::Interrupted
        ));
    }

    struct Counting {
        options: Options,
    }

    impl Processor for Counting {
        fn name(&self) -> &'static str {
            "Counting"
        }
        fn options(&self) -> &Options {
            &self.options
        }
        fn options_mut(&mut self) -> &mut Options {
            &mut self.options
        }
        fn run_impl(&self, ctx: &mut Context) -> Result<()> {
            let n = ctx.meta.get("COUNTER").unwrap_or_default();
            ctx.meta.set("COUNTER", &format!("{}x", n));
            Ok(())
        }
    }

    #[test]
    fn pipe_runs_children_in_order() {
        let mut pipe = Pipe::new("TwoSteps");
        pipe.add(Box::new(Counting {
            options: Options::new(),
        }));
        pipe.add(Box::new(Counting {
            options: Options::new(),
        }));
        let mut ctx = Context::new(Meta::new());
        run_processor(&pipe, &mut ctx).unwrap();
        assert_eq!(ctx.meta.get("COUNTER").unwrap(), "xx");
        assert!(pipe.tree().contains("Counting"));
    }

    #[test]
    fn temp_files_are_deleted_on_drop() {
        let path;
        {
            let mut temps = TempFiles::new(false);
            path = temps.create().unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
