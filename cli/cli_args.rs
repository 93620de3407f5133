use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        short = 'r',
        long = "root",
        visible_alias = "project-root",
        help = "Project directory to export (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .xtools/xmark/xmark.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config_file",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub no_config_file: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Print structured output instead of a table.", value_name = "FORMAT", value_parser = ["json", "yaml", "xml"], help_heading = "Output Formatting")]
    pub format: Option<String>,

    #[arg(
        long,
        help = "Pretty-print JSON output (default: compact).",
        help_heading = "Output Formatting"
    )]
    pub disable_json_minify: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterGroup {
    #[arg(long = "ignore", value_name = "GLOB", action = clap::ArgAction::Append, help = "Ignore paths matching GLOB ('**' supported). Repeatable.", help_heading = "Filtering")]
    pub ignore: Vec<String>,

    #[arg(long = "only-ext", value_name = "EXT", action = clap::ArgAction::Append, help = "Only include files with this extension (e.g. 'py' or '.py'). Repeatable.", help_heading = "Filtering")]
    pub only_ext: Vec<String>,

    #[arg(
        long,
        help = "Exclude hidden files and directories (names starting with '.').",
        help_heading = "Filtering"
    )]
    pub exclude_hidden: bool,

    #[arg(
        long,
        help = "Add the built-in ignore list (VCS metadata, caches, build output).",
        help_heading = "Filtering"
    )]
    pub builtin_ignores: bool,

    #[arg(
        long,
        help = "Also honour the root .gitignore.",
        help_heading = "Filtering"
    )]
    pub gitignore: bool,

    #[arg(
        long,
        help = "Follow directory symlinks that stay inside the root.",
        help_heading = "Filtering"
    )]
    pub follow_symlinks: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContentGroup {
    #[arg(
        long,
        value_name = "BYTES",
        help = "Maximum bytes of each file embedded in the report [default: 300000].",
        help_heading = "Content"
    )]
    pub max_bytes_per_file: Option<u64>,

    #[arg(long, value_name = "POLICY", value_parser = ["fence", "render", "skip"], help = "How Markdown files are embedded [default: fence].", help_heading = "Content")]
    pub md_policy: Option<String>,

    #[arg(
        long,
        value_name = "TITLE",
        help = "Report title [default: 'Project Export: <root name>'].",
        help_heading = "Content"
    )]
    pub title: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReportGroup {
    #[arg(
        long = "top-n-largest",
        value_name = "N",
        help = "Length of the largest/longest file rankings [default: 12].",
        help_heading = "Report Sections"
    )]
    pub top_n: Option<usize>,

    #[arg(
        long,
        help = "Include a naive Python import graph (Mermaid).",
        help_heading = "Report Sections"
    )]
    pub mermaid_import_graph: bool,

    #[arg(
        long,
        help = "Omit the overview metrics and per-file metric lines.",
        help_heading = "Report Sections"
    )]
    pub no_metrics: bool,

    #[arg(
        long,
        help = "Omit per-file summaries.",
        help_heading = "Report Sections"
    )]
    pub no_summaries: bool,

    #[arg(
        long,
        help = "Omit the generation timestamp comment (byte-identical reruns).",
        help_heading = "Report Sections"
    )]
    pub no_timestamp: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LimitsGroup {
    #[arg(
        long,
        value_name = "N",
        help = "Worker threads for file analysis [default: one per core].",
        help_heading = "Limits"
    )]
    pub threads: Option<usize>,

    #[arg(
        long,
        value_name = "N",
        help = "Stop after N files have been listed.",
        help_heading = "Limits"
    )]
    pub max_files: Option<usize>,

    #[arg(
        long,
        value_name = "DURATION",
        help = "Stop listing files after this wall-clock time (e.g. '30s', '500ms').",
        help_heading = "Limits"
    )]
    pub time_budget: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export a project directory as one navigable Markdown document.",
    long_about = "xmark walks a project directory, classifies and measures every included file, \nand assembles a single Markdown report (overview metrics, tree, table of contents, \noptional import graph and one section per file) for reviewers and long-context models.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xmark generate -r . --exclude-hidden --ignore '**/node_modules/**'\n  xmark generate --stdout --md-policy render --no-timestamp\n  xmark metrics -f json\n  xmark debug --only-ext py",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Generate the Markdown report."
    )]
    Generate(GenerateArgs),

    #[command(
        visible_alias = "m",
        about = "Calculate and display project statistics."
    )]
    Metrics(MetricsArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration and planned file inclusions."
    )]
    Debug(DebugArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),

    #[command(about = "Show or save the default configuration file structure.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Output file [default: <project>_YYYYMMDD_HHMMSS.md in the current dir].",
        help_heading = "Output Control",
        conflicts_with = "stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        help = "Write the report to standard output instead of a file.",
        help_heading = "Output Control"
    )]
    pub stdout: bool,

    #[clap(flatten)]
    pub filters: FilterGroup,
    #[clap(flatten)]
    pub content: ContentGroup,
    #[clap(flatten)]
    pub report: ReportGroup,
    #[clap(flatten)]
    pub limits: LimitsGroup,
}

#[derive(Args, Debug, Clone)]
pub struct MetricsArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterGroup,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterGroup,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[arg(
        long,
        help = "Save default config structure to default path (prompts overwrite)."
    )]
    pub save: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "xmark",
            "gen",
            "-r",
            "proj",
            "--ignore",
            "**/node_modules/**",
            "--ignore",
            "*.lock",
            "--exclude-hidden",
            "--md-policy",
            "render",
            "--top-n-largest",
            "5",
            "--stdout",
        ])
        .unwrap();
        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.project_config.project_root, Some(PathBuf::from("proj")));
        assert_eq!(args.filters.ignore.len(), 2);
        assert!(args.filters.exclude_hidden);
        assert_eq!(args.content.md_policy.as_deref(), Some("render"));
        assert_eq!(args.report.top_n, Some(5));
        assert!(args.stdout);
    }

    #[test]
    fn negative_numbers_are_rejected() {
        assert!(Cli::try_parse_from(["xmark", "generate", "--max-bytes-per-file", "-1"]).is_err());
        assert!(Cli::try_parse_from(["xmark", "generate", "--top-n-largest", "-3"]).is_err());
    }

    #[test]
    fn output_conflicts_with_stdout() {
        assert!(Cli::try_parse_from(["xmark", "generate", "-o", "x.md", "--stdout"]).is_err());
    }
}
