//! npy2mat - NPY FOLDER TO MAT CONVERTER
//!
//! 메인 엔트리포인트

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;

use npy2mat::{
    cli::Args,
    converter::{ConversionPlan, ConversionResult, ConversionRun, Converter},
    report::{write_error_log, write_json_report},
    stats::Statistics,
};

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // 헤더 출력
    print_header(&args);

    // 변환기 초기화 (패턴/변수 이름 검사)
    let converter = Converter::new(args.to_options())?;

    // 입력 폴더 검사 및 .npy 파일 수집
    let plan = converter.plan(&args.input)?;

    if args.verbose {
        for path in &plan.skipped {
            println!(
                "  {} 건너뜀: {:?}",
                "•".dimmed(),
                path.file_name().unwrap_or_default()
            );
        }
    }

    // 대상이 없어도 출력 폴더 검사와 요약, 리포트는 그대로 진행
    if plan.sources.is_empty() {
        println!("{}", "⚠️ 처리할 .npy 파일이 없습니다.".yellow());
    } else {
        println!(
            "  {} 발견된 파일 수: {}",
            "📋".bright_white(),
            plan.sources.len().to_string().bright_green()
        );
    }

    // 드라이런 모드
    if args.dry_run {
        print_dry_run(&plan, args.output.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    let run = if args.validate_only {
        run_validation_mode(&args, &converter, &plan)
    } else {
        run_conversion_mode(&args, &converter, &plan)?
    };

    // 로그 파일 작성
    if let Some(ref log_path) = args.log {
        write_error_log(log_path, &run)
            .with_context(|| format!("에러 로그 저장 실패: {:?}", log_path))?;
        println!("\n{} 에러 로그 저장: {:?}", "📝".bright_cyan(), log_path);
    }

    // JSON 리포트 작성
    if let Some(ref report_path) = args.report {
        write_json_report(report_path, &run)
            .with_context(|| format!("리포트 저장 실패: {:?}", report_path))?;
        println!("{} 리포트 저장: {:?}", "🧾".bright_cyan(), report_path);
    }

    if run.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

/// 헤더 출력
fn print_header(args: &Args) {
    println!("\n{}", "═".repeat(50).bright_blue());
    println!("{}", " 🚀 NPY FOLDER TO MAT CONVERTER".bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 입력 폴더: {:?}", "📂".bright_cyan(), args.input);

    if !args.validate_only {
        if let Some(ref output) = args.output {
            println!("  {} 출력 폴더: {:?}", "📄".bright_green(), output);
        }
        println!("  {} 모드: {}", "⚙️".bright_yellow(), args.mode);
    }

    if let Some(ref pattern) = args.pattern {
        println!("  {} 패턴 필터: {}", "🔍".bright_magenta(), pattern);
    }

    if let Some(ref name) = args.var_name {
        println!("  {} 고정 변수 이름: {}", "🎯".bright_cyan(), name);
    }

    if args.verify {
        println!("  {} {}", "🔁".bright_cyan(), "기록 후 재검증".cyan());
    }

    if args.dry_run {
        println!(
            "  {} {}",
            "⚠️".bright_yellow(),
            "드라이런 모드 (실제 변환 없음)".yellow()
        );
    }

    if args.validate_only {
        println!("  {} {}", "🔍".bright_cyan(), "유효성 검사 모드".cyan());
    }

    println!("{}", "═".repeat(50).bright_blue());
    println!("\n{}", "📁 파일 검색 중...".bright_cyan());
}

/// 드라이런 출력
fn print_dry_run(plan: &ConversionPlan, output: Option<&Path>) {
    println!("\n{}", "📋 처리 예정 파일 목록:".bright_cyan());
    for (i, source) in plan.sources.iter().enumerate() {
        let destination = output
            .map(|dir| source.destination_in(dir))
            .unwrap_or_else(|| source.destination_in(Path::new("")));
        println!(
            "  {}. {} → {}",
            i + 1,
            source.file_name(),
            destination.display()
        );
    }
    println!(
        "\n{} 총 {} 개의 파일이 처리될 예정입니다.",
        "ℹ️".bright_blue(),
        plan.sources.len().to_string().bright_green()
    );
}

/// 유효성 검사 모드 실행
fn run_validation_mode(args: &Args, converter: &Converter, plan: &ConversionPlan) -> ConversionRun {
    let pb = create_progress_bar(plan.sources.len());

    println!("\n{}", "🔍 유효성 검사 중...".bright_cyan());

    let run = converter.validate_with(plan, |result| {
        print_result(&pb, result, args.verbose);
        pb.inc(1);
    });

    pb.finish_with_message("완료!");

    Statistics::from_run(&run).print_validation_summary();

    if run.failed == 0 {
        println!("\n{} 모든 파일이 유효합니다!\n", "✅".bright_green());
    } else {
        println!(
            "\n{} {} 개의 파일에 오류가 있습니다.\n",
            "⚠️".bright_yellow(),
            run.failed.to_string().red()
        );
    }

    run
}

/// 변환 모드 실행
fn run_conversion_mode(
    args: &Args,
    converter: &Converter,
    plan: &ConversionPlan,
) -> Result<ConversionRun> {
    let output = args
        .output
        .as_deref()
        .context("출력 폴더(-o)가 필요합니다")?;

    let pb = create_progress_bar(plan.sources.len());

    println!("\n{}", "⚡ 변환 중...".bright_cyan());

    let run = converter.execute(plan, output, |result| {
        print_result(&pb, result, args.verbose);
        pb.inc(1);
    })?;

    pb.finish_with_message("완료!");

    // 통계 출력
    Statistics::from_run(&run).print_summary();

    let summary = run.summary_line();
    if run.failed == 0 {
        println!("\n{} {}", "✅".bright_green(), summary.bright_green());
    } else {
        println!("\n{} {}", "⚠️".bright_yellow(), summary.yellow());
    }
    println!("{} 저장 위치: {:?}\n", "💾".bright_cyan(), output);

    Ok(run)
}

/// 파일 하나의 로그 라인 출력
fn print_result(pb: &ProgressBar, result: &ConversionResult, verbose: bool) {
    let line = result.log_line();
    if result.success {
        pb.println(format!("  {}", line.green()));
    } else {
        pb.println(format!("  {}", line.red()));
        if verbose {
            pb.println(format!("    {}", result.source.display().to_string().dimmed()));
        }
    }
}

/// 진행률 바 생성
fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    pb
}
