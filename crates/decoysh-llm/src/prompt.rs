//! Prompt templates

use decoysh::{BackendError, FileSystemNode};

const SIMULATE_TEMPLATE: &str = "You are a Linux terminal emulator. Given the filesystem JSON, a short bash history, and a command, pretend you executed the command on a real machine and return a JSON object ONLY (no commentary) with the following fields:
- stdout: string (what would be printed to stdout)
- stderr: string (what would be printed to stderr)
- exit_code: integer (0 for success, non-zero for failure)
- explanation: short string explaining any assumptions or notable details

Filesystem JSON:
{fs}

Bash history (most recent last):
{bash_history}

Command:
{command}

Return JSON only.
";

const GENERATE_FS_TEMPLATE: &str = "You will generate a JSON filesystem tree rooted at \"{target_dir}\". Produce a single JSON object only (no commentary) describing the tree. Use this schema:
- type: \"dir\" or \"file\"
- name: basename (string)
- children: array of nodes (for dirs only)
- size: integer bytes (for files; optional)
- content_summary: short string describing interesting contents (optional)

Constraints:
- Only include entries under \"{target_dir}\"
- Keep total files <= {max_files}, max depth <= {max_depth}
- Make the filesystem interesting for a honeypot: include config files, ssh keys, scripts, README files, suspicious binaries, and a mix of typical user files.
- Use the provided seed={seed} for determinism if given.

Return JSON only.
";

/// Options for generating a filesystem snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsGenOptions {
    pub seed: Option<u64>,
    /// Default: 200
    pub max_files: usize,
    /// Default: 4
    pub max_depth: usize,
    /// Default: `/home/user`
    pub target_dir: String,
}

impl Default for FsGenOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_files: 200,
            max_depth: 4,
            target_dir: decoysh::ROOT_PATH.to_string(),
        }
    }
}

/// Prompt asking the model to run `command`.
pub fn simulate_prompt(
    command: &str,
    fs: &FileSystemNode,
    history: &[String],
) -> Result<String, BackendError> {
    let fs = serde_json::to_string(fs)
        .map_err(|e| BackendError::Config(format!("cannot encode snapshot: {}", e)))?;
    let history = serde_json::to_string(history)
        .map_err(|e| BackendError::Config(format!("cannot encode history: {}", e)))?;
    Ok(render(
        SIMULATE_TEMPLATE,
        &[
            ("fs", fs.as_str()),
            ("bash_history", history.as_str()),
            ("command", command),
        ],
    ))
}

/// Prompt asking the model for a snapshot tree.
pub fn generate_fs_prompt(opts: &FsGenOptions) -> String {
    let seed = opts
        .seed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    let max_files = opts.max_files.to_string();
    let max_depth = opts.max_depth.to_string();
    render(
        GENERATE_FS_TEMPLATE,
        &[
            ("target_dir", opts.target_dir.as_str()),
            ("max_files", max_files.as_str()),
            ("max_depth", max_depth.as_str()),
            ("seed", seed.as_str()),
        ],
    )
}

/// Single-pass `{name}` substitution. Substituted text is never rescanned,
/// so attacker-typed braces stay literal.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let var = vars
            .iter()
            .find(|(name, _)| tail.starts_with(*name) && tail[name.len()..].starts_with('}'));
        match var {
            Some(&(name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
