//! 통합 테스트 모듈
//!
//! npy2mat의 전체 변환 흐름을 테스트합니다.

#![allow(dead_code)]

use ndarray::{array, ArrayD, IxDyn, ShapeBuilder};
use ndarray_npy::WriteNpyExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 테스트용 .npy 파일 생성 헬퍼
fn create_npy_file<A, D>(dir: &Path, name: &str, array: &ndarray::Array<A, D>) -> PathBuf
where
    A: ndarray_npy::WritableElement,
    D: ndarray::Dimension,
{
    let path = dir.join(name);
    array.write_npy(File::create(&path).unwrap()).unwrap();
    path
}

/// 임의 바이트 파일 생성 헬퍼
fn create_raw_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// 손으로 만든 v1.0 .npy 바이트열
fn raw_npy(dict: &str, data: &[u8]) -> Vec<u8> {
    let mut header = dict.to_string();
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}

/// .mat 파일을 읽어 유일한 변수 반환
fn read_single_variable(path: &Path) -> npy2mat::MatVariable {
    let mut variables = npy2mat::read_mat(File::open(path).unwrap()).unwrap();
    assert_eq!(variables.len(), 1);
    variables.remove(0)
}

/// 입력/출력 폴더 쌍 생성
fn setup_dirs() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("npy");
    let output = temp_dir.path().join("mat");
    fs::create_dir(&input).unwrap();
    (temp_dir, input, output)
}

fn mat_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".mat"))
        .collect();
    names.sort();
    names
}

mod scenario_tests {
    use super::*;
    use npy2mat::{convert, ArrayPayload, ElementKind, FailureKind};

    #[test]
    fn test_weights_and_corrupt_file() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "weights.npy", &array![[1f32, 2., 3.], [4., 5., 6.]]);
        create_raw_file(&input, "corrupt.npy", b"\x93NUMPY\x01\x00\x76");

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 2);
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.failed, 1);

        // 파일 이름순: corrupt.npy가 먼저
        let failed = &run.results[0];
        assert!(!failed.success);
        assert_eq!(failed.failure.as_ref().unwrap().kind, FailureKind::Decode);
        assert!(failed.log_line().contains("corrupt.npy"));
        assert!(!output.join("corrupt.mat").exists());

        let ok = &run.results[1];
        assert!(ok.success);
        assert_eq!(ok.destination.as_deref(), Some(output.join("weights.mat").as_path()));
        assert_eq!(ok.element_kind, Some(ElementKind::Float32));
        assert_eq!(ok.shape, Some(vec![2, 3]));

        let variable = read_single_variable(&output.join("weights.mat"));
        assert_eq!(variable.name, "weights");
        assert_eq!(
            variable.data,
            ArrayPayload::Float32(array![[1f32, 2., 3.], [4., 5., 6.]].into_dyn())
        );
    }

    #[test]
    fn test_empty_input_directory() {
        let (_temp, input, output) = setup_dirs();

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 0);
        assert_eq!(run.succeeded, 0);
        assert_eq!(run.failed, 0);
        assert!(run.results.is_empty());
        assert!(output.is_dir());
    }

    #[test]
    fn test_one_malformed_among_many() {
        let (_temp, input, output) = setup_dirs();
        for i in 0..4 {
            create_npy_file(&input, &format!("valid{}.npy", i), &array![i as f64, 1.0]);
        }
        create_raw_file(&input, "broken.npy", b"definitely not numpy");

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 5);
        assert_eq!(run.succeeded, 4);
        assert_eq!(run.failed, 1);
        assert_eq!(
            mat_files(&output),
            vec!["valid0.mat", "valid1.mat", "valid2.mat", "valid3.mat"]
        );
    }

    #[test]
    fn test_missing_input_directory() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("does_not_exist");
        let output = temp_dir.path().join("mat");

        let err = convert(&input, &output).unwrap_err();

        assert!(err.is_directory_error());
        assert!(!output.exists());
    }

    #[test]
    fn test_colliding_destination_names() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "a.NPY", &array![1i32, 2, 3]);
        create_npy_file(&input, "a.npy", &array![7i32, 8, 9]);

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 2);
        assert_eq!(run.succeeded, 2);
        assert_eq!(mat_files(&output), vec!["a.mat"]);

        // "a.NPY" < "a.npy" 이므로 나중에 쓴 a.npy가 남음
        let variable = read_single_variable(&output.join("a.mat"));
        assert_eq!(
            variable.data,
            ArrayPayload::Int32(array![[7i32, 8, 9]].into_dyn())
        );
    }

    #[test]
    fn test_idempotent_output() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "m.npy", &array![[1u16, 2], [3, 4], [5, 6]]);

        convert(&input, &output).unwrap();
        let first = fs::read(output.join("m.mat")).unwrap();
        convert(&input, &output).unwrap();
        let second = fs::read(output.join("m.mat")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_deterministic_order_and_skipped_files() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "c.npy", &array![3u8]);
        create_npy_file(&input, "a.npy", &array![1u8]);
        create_npy_file(&input, "b.npy", &array![2u8]);
        create_raw_file(&input, "notes.txt", b"hello");
        fs::create_dir(input.join("nested")).unwrap();
        create_npy_file(&input.join("nested"), "deep.npy", &array![4u8]);

        let run = convert(&input, &output).unwrap();

        let names: Vec<String> = run.results.iter().map(|r| r.file_name()).collect();
        assert_eq!(names, vec!["a.npy", "b.npy", "c.npy"]);
        assert_eq!(run.skipped, vec![input.join("notes.txt")]);
        assert!(!output.join("deep.mat").exists());
    }
}

mod fidelity_tests {
    use super::*;
    use npy2mat::{convert, mat::mat_dims, ArrayPayload};
    use num_complex::Complex;

    /// .npy로 쓰고 변환한 뒤 .mat 변수를 원본과 비교
    fn assert_round_trip(payload: ArrayPayload) {
        let (_temp, input, output) = setup_dirs();
        let path = input.join("sample.npy");
        let file = File::create(&path).unwrap();
        match &payload {
            ArrayPayload::Bool(a) => a.write_npy(file),
            ArrayPayload::Int8(a) => a.write_npy(file),
            ArrayPayload::UInt8(a) => a.write_npy(file),
            ArrayPayload::Int16(a) => a.write_npy(file),
            ArrayPayload::UInt16(a) => a.write_npy(file),
            ArrayPayload::Int32(a) => a.write_npy(file),
            ArrayPayload::UInt32(a) => a.write_npy(file),
            ArrayPayload::Int64(a) => a.write_npy(file),
            ArrayPayload::UInt64(a) => a.write_npy(file),
            ArrayPayload::Float32(a) => a.write_npy(file),
            ArrayPayload::Float64(a) => a.write_npy(file),
            ArrayPayload::Complex64(a) => a.write_npy(file),
            ArrayPayload::Complex128(a) => a.write_npy(file),
        }
        .unwrap();

        let run = convert(&input, &output).unwrap();
        assert_eq!(run.succeeded, 1, "{:?}", run.results);

        let variable = read_single_variable(&output.join("sample.mat"));
        assert_eq!(variable.name, "sample");
        assert_eq!(variable.data.kind(), payload.kind());
        assert_eq!(
            variable.data,
            payload.reshaped(&mat_dims(payload.shape())).unwrap()
        );
    }

    #[test]
    fn test_round_trip_integers() {
        assert_round_trip(ArrayPayload::Int8(array![[-128i8, 0], [5, 127]].into_dyn()));
        assert_round_trip(ArrayPayload::UInt8(array![[0u8, 255, 7]].into_dyn()));
        assert_round_trip(ArrayPayload::Int16(array![[-300i16], [300]].into_dyn()));
        assert_round_trip(ArrayPayload::UInt16(array![[1u16, 65535]].into_dyn()));
        assert_round_trip(ArrayPayload::Int32(array![[[1i32, -8], [3, 4]], [[-5, 0], [7, 38]]].into_dyn()));
        assert_round_trip(ArrayPayload::UInt32(array![[u32::MAX, 0]].into_dyn()));
        assert_round_trip(ArrayPayload::Int64(array![[i64::MIN, i64::MAX]].into_dyn()));
        assert_round_trip(ArrayPayload::UInt64(array![[u64::MAX, 1]].into_dyn()));
    }

    #[test]
    fn test_round_trip_floats() {
        assert_round_trip(ArrayPayload::Float32(array![[3f32, -1.4], [-159., 26.]].into_dyn()));
        assert_round_trip(ArrayPayload::Float64(
            array![[2.7, -40.4, -23.], [27.8, -49., -43.3]].into_dyn(),
        ));
    }

    #[test]
    fn test_round_trip_bool() {
        assert_round_trip(ArrayPayload::Bool(
            array![[[true], [true], [false]], [[false], [true], [false]]].into_dyn(),
        ));
    }

    #[test]
    fn test_round_trip_complex() {
        assert_round_trip(ArrayPayload::Complex64(
            array![[Complex::new(1f32, 2.), Complex::new(-3., 0.5)]].into_dyn(),
        ));
        assert_round_trip(ArrayPayload::Complex128(
            array![[Complex::new(1f64, -2.)], [Complex::new(0., 9.)]].into_dyn(),
        ));
    }

    #[test]
    fn test_round_trip_vector_and_scalar() {
        assert_round_trip(ArrayPayload::Float64(array![1.0, 2.0, 3.0].into_dyn()));
        assert_round_trip(ArrayPayload::Int32(ndarray::arr0(42i32).into_dyn()));
    }

    #[test]
    fn test_round_trip_fortran_order() {
        let values: Vec<f64> = (0..6).map(f64::from).collect();
        let fortran = ArrayD::from_shape_vec(IxDyn(&[2, 3]).f(), values).unwrap();
        assert_round_trip(ArrayPayload::Float64(fortran));
    }

    #[test]
    fn test_round_trip_empty_array() {
        assert_round_trip(ArrayPayload::Float32(ArrayD::zeros(IxDyn(&[0, 4]))));
    }
}

mod failure_tests {
    use super::*;
    use npy2mat::converter::verify_mat;
    use npy2mat::{
        convert, ConvertOptions, Converter, FailureKind, FileFailure, Npy2MatError, WriteMode,
    };

    #[test]
    fn test_unsupported_element_type() {
        let (_temp, input, output) = setup_dirs();
        create_raw_file(
            &input,
            "half.npy",
            &raw_npy("{'descr': '<f2', 'fortran_order': False, 'shape': (2,), }", &[0; 4]),
        );

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.failed, 1);
        let failure = run.results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Decode);
        assert!(failure.message.contains("<f2"));
        assert!(!output.join("half.mat").exists());
    }

    #[test]
    fn test_truncated_data() {
        let (_temp, input, output) = setup_dirs();
        create_raw_file(
            &input,
            "short.npy",
            &raw_npy("{'descr': '<f8', 'fortran_order': False, 'shape': (4,), }", &[0; 8]),
        );

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.failed, 1);
        assert_eq!(
            run.results[0].failure.as_ref().unwrap().kind,
            FailureKind::Decode
        );
    }

    #[test]
    fn test_big_endian_source() {
        let (_temp, input, output) = setup_dirs();
        let data: Vec<u8> = [1.5f64, -2.25].iter().flat_map(|v| v.to_be_bytes()).collect();
        create_raw_file(
            &input,
            "be.npy",
            &raw_npy("{'descr': '>f8', 'fortran_order': False, 'shape': (2,), }", &data),
        );

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.succeeded, 1);
        let variable = read_single_variable(&output.join("be.mat"));
        assert_eq!(
            variable.data,
            npy2mat::ArrayPayload::Float64(array![[1.5, -2.25]].into_dyn())
        );
    }

    #[test]
    fn test_error_mode_keeps_existing_destination() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "x.npy", &array![1.0f64]);
        fs::create_dir(&output).unwrap();
        create_raw_file(&output, "x.mat", b"existing");

        let converter =
            Converter::new(ConvertOptions::new().with_write_mode(WriteMode::Error)).unwrap();
        let run = converter.convert(&input, &output).unwrap();

        assert_eq!(run.failed, 1);
        assert_eq!(
            run.results[0].failure.as_ref().unwrap().kind,
            FailureKind::Encode
        );
        assert_eq!(fs::read(output.join("x.mat")).unwrap(), b"existing");
    }

    #[test]
    fn test_empty_input_still_checks_output_directory() {
        let (temp, input, _output) = setup_dirs();
        let not_a_dir = create_raw_file(temp.path(), "occupied", b"");

        let converter = Converter::new(ConvertOptions::new()).unwrap();
        let plan = converter.plan(&input).unwrap();
        assert!(plan.sources.is_empty());

        let err = converter.execute(&plan, &not_a_dir, |_| {}).unwrap_err();
        assert!(matches!(err, Npy2MatError::OutputUnavailable { .. }));
    }

    #[test]
    fn test_blocked_destination_does_not_stop_batch() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "a.npy", &array![1.0f64, 2.0]);
        create_npy_file(&input, "b.npy", &array![3.0f64, 4.0]);
        // a.mat 자리에 폴더가 있어 파일을 만들 수 없음
        fs::create_dir_all(output.join("a.mat")).unwrap();

        let run = convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 2);
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.failed, 1);

        let blocked = &run.results[0];
        assert_eq!(blocked.file_name(), "a.npy");
        assert_eq!(blocked.failure.as_ref().unwrap().kind, FailureKind::Encode);
        assert_eq!(blocked.element_kind, Some(npy2mat::ElementKind::Float64));

        assert!(run.results[1].success);
        assert!(output.join("b.mat").is_file());
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "w.npy", &array![[1i32, 2], [3, 4]]);
        convert(&input, &output).unwrap();
        let destination = output.join("w.mat");

        let written = npy2mat::ArrayPayload::Int32(array![[1i32, 2], [3, 4]].into_dyn());
        verify_mat(&destination, "w", &written).unwrap();

        let err = verify_mat(&destination, "other", &written).unwrap_err();
        assert!(matches!(err, Npy2MatError::Verify { .. }));
        assert_eq!(FileFailure::from(err).kind, FailureKind::Verify);

        let different = npy2mat::ArrayPayload::Int32(array![[1i32, 2], [3, 5]].into_dyn());
        let err = verify_mat(&destination, "w", &different).unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::Verify));

        let other_kind = npy2mat::ArrayPayload::Int64(array![[1i64, 2], [3, 4]].into_dyn());
        assert!(verify_mat(&destination, "w", &other_kind).is_err());
    }

    #[test]
    fn test_output_path_is_a_file() {
        let (temp, input, _output) = setup_dirs();
        create_npy_file(&input, "x.npy", &array![1.0f64]);
        let not_a_dir = create_raw_file(temp.path(), "occupied", b"");

        let err = convert(&input, &not_a_dir).unwrap_err();
        assert!(err.is_directory_error());
    }
}

mod option_tests {
    use super::*;
    use npy2mat::{ConversionResult, ConvertOptions, Converter};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fixed_variable_name() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "trial-01.npy", &array![[1i64, 2]]);

        let converter = Converter::new(
            ConvertOptions::new().with_variable_name(Some("data".to_string())),
        )
        .unwrap();
        let run = converter.convert(&input, &output).unwrap();

        assert_eq!(run.succeeded, 1);
        let variable = read_single_variable(&output.join("trial-01.mat"));
        assert_eq!(variable.name, "data");
    }

    #[test]
    fn test_pattern_filter() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "weights_1.npy", &array![1f32]);
        create_npy_file(&input, "weights_2.npy", &array![2f32]);
        create_npy_file(&input, "bias.npy", &array![3f32]);

        let converter =
            Converter::new(ConvertOptions::new().with_pattern(Some("weights_*".to_string())))
                .unwrap();
        let run = converter.convert(&input, &output).unwrap();

        assert_eq!(run.attempted, 2);
        assert_eq!(run.skipped, vec![input.join("bias.npy")]);
        assert_eq!(mat_files(&output), vec!["weights_1.mat", "weights_2.mat"]);
    }

    #[test]
    fn test_verify_option() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "v.npy", &array![[1.0f64, 2.0], [3.0, 4.0]]);

        let converter = Converter::new(ConvertOptions::new().with_verify(true)).unwrap();
        let run = converter.convert(&input, &output).unwrap();

        assert_eq!(run.succeeded, 1);
        assert!(run.results[0].bytes_written > 128);
    }

    #[test]
    fn test_mmap_path_for_large_files() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "big.npy", &ArrayD::<f64>::ones(IxDyn(&[64, 64])));

        let converter = Converter::new(ConvertOptions::new().with_mmap_threshold(1)).unwrap();
        let run = converter.convert(&input, &output).unwrap();

        assert_eq!(run.succeeded, 1);
        assert_eq!(run.results[0].shape, Some(vec![64, 64]));
    }

    #[test]
    fn test_callback_receives_results_in_order() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "b.npy", &array![2i8]);
        create_npy_file(&input, "a.npy", &array![1i8]);

        let converter = Converter::new(ConvertOptions::new()).unwrap();
        let mut seen: Vec<ConversionResult> = Vec::new();
        let run = converter
            .convert_with(&input, &output, |result| seen.push(result.clone()))
            .unwrap();

        assert_eq!(seen, run.results);
        assert_eq!(seen[0].file_name(), "a.npy");
    }

    #[test]
    fn test_cancel_stops_before_next_file() {
        let (_temp, input, output) = setup_dirs();
        for name in ["a.npy", "b.npy", "c.npy"] {
            create_npy_file(&input, name, &array![1u32]);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let converter =
            Converter::new(ConvertOptions::new().with_cancel_flag(Arc::clone(&cancel))).unwrap();
        let run = converter
            .convert_with(&input, &output, |_| cancel.store(true, Ordering::Relaxed))
            .unwrap();

        assert!(run.cancelled);
        assert_eq!(run.attempted, 1);
        assert_eq!(mat_files(&output), vec!["a.mat"]);
    }

    #[test]
    fn test_validate_only_writes_nothing() {
        let (_temp, input, output) = setup_dirs();
        create_npy_file(&input, "good.npy", &array![1u8, 2]);
        create_raw_file(&input, "bad.npy", b"garbage");

        let converter = Converter::new(ConvertOptions::new()).unwrap();
        let plan = converter.plan(&input).unwrap();
        let run = converter.validate_with(&plan, |_| {});

        assert_eq!(run.attempted, 2);
        assert_eq!(run.succeeded, 1);
        assert_eq!(run.failed, 1);
        assert!(run.results.iter().all(|r| r.destination.is_none()));
        assert!(!output.exists());
    }
}

mod error_tests {
    use npy2mat::Npy2MatError;
    use std::path::PathBuf;

    #[test]
    fn test_error_display() {
        let error = Npy2MatError::InputNotFound {
            path: PathBuf::from("/nonexistent"),
        };
        let msg = error.to_string();
        assert!(msg.contains("입력 폴더를 찾을 수 없습니다"));
    }

    #[test]
    fn test_decode_error_display() {
        let error = Npy2MatError::Decode {
            file: PathBuf::from("corrupt.npy"),
            reason: "매직 문자열이 일치하지 않습니다".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains(".npy 디코딩 실패"));
        assert!(msg.contains("corrupt.npy"));
    }
}
