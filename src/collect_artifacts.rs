// 语料统计工具 - 扫描庭审转录，输出各规则类别的频次和样本
//
// 用法:
//   collect-artifacts <transcripts_dir> [-o report.json] [--summary]
//                     [--status status.json] [--min-instances N] [--config normalizer.json]
use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use oyez_tnl_lib::tnl::{ScanError, VerificationStatus};
use oyez_tnl_lib::{init_logging, NormalizerConfig, Utterance};

const DEFAULT_MIN_INSTANCES: u64 = 3;
const SUMMARY_TOP: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "collect-artifacts")]
#[command(about = "扫描庭审转录，统计需要规范化的书面形式", long_about = None)]
struct Args {
    /// 转录 JSON 所在目录（递归扫描）
    transcripts_dir: PathBuf,
    /// 报告输出路径，缺省时打印到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// 在标准错误输出各类别的高频样本
    #[arg(long)]
    summary: bool,
    /// 人工核对状态文件
    #[arg(long)]
    status: Option<PathBuf>,
    /// 每个类别至少需要核对的实例数
    #[arg(long, default_value_t = DEFAULT_MIN_INSTANCES)]
    min_instances: u64,
    /// 配置文件路径，缺省时使用用户配置目录
    #[arg(long)]
    config: Option<PathBuf>,
}

/// 转录文件中的一段发言
#[derive(Debug, Deserialize)]
struct Turn {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    stop: f64,
    /// 可能是名字字符串，也可能是带 name 字段的对象
    #[serde(default)]
    speaker: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    speakers: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Transcript {
    #[serde(default)]
    turns: Vec<Turn>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

fn speaker_name(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(name) => name.clone(),
        serde_json::Value::Object(map) => map
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// 递归收集目录下的 *.json 文件（按路径排序）
fn transcript_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn load_transcript(path: &Path) -> Result<Vec<Utterance>, ScanError> {
    let unreadable = |message: String| ScanError::Unreadable {
        source_name: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let transcript: Transcript =
        serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))?;
    let source = path.display().to_string();
    let mut utterances: Vec<Utterance> = transcript
        .turns
        .into_iter()
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| {
            Utterance::new(turn.text, turn.start, turn.stop, speaker_name(&turn.speaker))
                .with_source(source.clone())
        })
        .collect();

    // 元数据里的发言人全名（Jr.、Sr.、中间名缩写）也计入统计
    let speakers_source = format!("{}#metadata.speakers", source);
    utterances.extend(
        transcript
            .metadata
            .unwrap_or_default()
            .speakers
            .iter()
            .map(speaker_name)
            .filter(|name| !name.trim().is_empty())
            .map(|name| Utterance::from_text(name).with_source(speakers_source.clone())),
    );
    Ok(utterances)
}

fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    if !args.transcripts_dir.is_dir() {
        anyhow::bail!("转录目录不存在: {:?}", args.transcripts_dir);
    }

    let config = match &args.config {
        Some(path) => NormalizerConfig::load_from_path(path)?,
        None => NormalizerConfig::load()?,
    };
    let reporter = config.build_reporter()?;

    let files = transcript_files(&args.transcripts_dir);
    tracing::info!("发现 {} 个转录文件", files.len());

    let mut corpus = Vec::new();
    let mut unreadable = Vec::new();
    for path in &files {
        match load_transcript(path) {
            Ok(utterances) => corpus.extend(utterances),
            Err(e) => unreadable.push(e),
        }
    }

    let mut report = reporter.scan(&corpus);
    for error in &unreadable {
        report.record_skipped(error);
    }

    let json = report.to_json_pretty()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("报告已写入: {:?}", path);
        }
        None => println!("{}", json),
    }

    if args.summary {
        for line in report.summary_lines(SUMMARY_TOP) {
            eprintln!("{}", line);
        }
    }

    if let Some(path) = &args.status {
        let status = VerificationStatus::load(path)?;
        let pending = report.needs_verification(&status, args.min_instances);
        if pending.is_empty() {
            eprintln!("所有类别均已核对至少 {} 个实例", args.min_instances);
        } else {
            eprintln!("需要补充核对的类别 ({}):", pending.len());
            for item in &pending {
                eprintln!(
                    "  {:<22} 出现 {} 次, 已核对 {}, 还需 {}  来源: {}",
                    item.category.as_str(),
                    item.seen,
                    item.verified,
                    item.missing,
                    item.sources.join(", ")
                );
            }
        }
    }

    Ok(())
}
