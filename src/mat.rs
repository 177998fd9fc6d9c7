//! MAT-file Level 5 인코딩 모듈
//!
//! 변수 하나를 담은 비압축 little-endian `.mat` 파일을 쓰고,
//! 같은 형식의 파일을 다시 읽어 검증할 수 있습니다.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use num_complex::Complex;
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

use crate::npy::ArrayPayload;

/// 헤더 텍스트 영역 크기
const HEADER_TEXT_LEN: usize = 116;
/// 헤더 전체 크기
const HEADER_LEN: usize = 128;
const VERSION: u16 = 0x0100;
const ENDIAN_INDICATOR: &[u8; 2] = b"IM";

// 데이터 타입 (mi*)
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// 배열 클래스 (mx*)
const MX_DOUBLE_CLASS: u8 = 6;
const MX_SINGLE_CLASS: u8 = 7;
const MX_INT8_CLASS: u8 = 8;
const MX_UINT8_CLASS: u8 = 9;
const MX_INT16_CLASS: u8 = 10;
const MX_UINT16_CLASS: u8 = 11;
const MX_INT32_CLASS: u8 = 12;
const MX_UINT32_CLASS: u8 = 13;
const MX_INT64_CLASS: u8 = 14;
const MX_UINT64_CLASS: u8 = 15;

const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

/// .mat 인코딩/디코딩 에러
#[derive(Error, Debug)]
pub enum MatError {
    #[error("I/O 에러: {0}")]
    Io(#[from] io::Error),

    #[error("차원 크기 {0}은(는) MAT 파일로 표현할 수 없습니다")]
    DimensionTooLarge(usize),

    #[error("데이터 요소가 너무 큽니다 ({0} 바이트)")]
    ElementTooLarge(u64),

    #[error("MAT 헤더가 올바르지 않습니다: {0}")]
    Header(String),

    #[error("압축된 데이터 요소는 지원하지 않습니다")]
    Compressed,

    #[error("데이터 요소 형식이 올바르지 않습니다: {0}")]
    Malformed(String),

    #[error("지원하지 않는 배열 클래스: {0}")]
    UnsupportedClass(u8),
}

/// .mat 파일에서 읽은 변수 하나
#[derive(Debug, Clone, PartialEq)]
pub struct MatVariable {
    pub name: String,
    /// MAT 차원 순서 그대로의 배열 (최소 2차원)
    pub data: ArrayPayload,
}

/// MAT 파일에 기록되는 차원
///
/// 0차원은 1×1, 길이 n인 1차원은 1×n 행 벡터가 됩니다.
///
/// # Examples
/// ```
/// use npy2mat::mat::mat_dims;
///
/// assert_eq!(mat_dims(&[]), vec![1, 1]);
/// assert_eq!(mat_dims(&[5]), vec![1, 5]);
/// assert_eq!(mat_dims(&[2, 3, 4]), vec![2, 3, 4]);
/// ```
pub fn mat_dims(shape: &[usize]) -> Vec<usize> {
    match shape.len() {
        0 => vec![1, 1],
        1 => vec![1, shape[0]],
        _ => shape.to_vec(),
    }
}

/// 8바이트 경계까지 채울 패딩 크기
fn padding(len: usize) -> usize {
    (8 - len % 8) % 8
}

/// 태그를 포함한 서브요소 전체 크기
fn element_len(payload_len: usize) -> usize {
    8 + payload_len + padding(payload_len)
}

/// 이름 서브요소 크기 (1..=4 바이트는 small data element 형식)
fn name_element_len(name: &[u8]) -> usize {
    if (1..=4).contains(&name.len()) {
        8
    } else {
        element_len(name.len())
    }
}

/// MAT 원소 타입별 인코딩 정보
trait MatElement: Copy {
    const DATA_TYPE: u32;
    const CLASS: u8;
    const SIZE: usize;

    fn write_le<W: Write>(self, writer: &mut W) -> io::Result<()>;
    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self>;
}

macro_rules! impl_mat_element {
    ($elem:ty, $data_type:expr, $class:expr, $write:ident, $read:ident) => {
        impl MatElement for $elem {
            const DATA_TYPE: u32 = $data_type;
            const CLASS: u8 = $class;
            const SIZE: usize = std::mem::size_of::<$elem>();

            fn write_le<W: Write>(self, writer: &mut W) -> io::Result<()> {
                writer.$write::<LittleEndian>(self)
            }

            fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
                reader.$read::<LittleEndian>()
            }
        }
    };
}

impl_mat_element!(i16, MI_INT16, MX_INT16_CLASS, write_i16, read_i16);
impl_mat_element!(u16, MI_UINT16, MX_UINT16_CLASS, write_u16, read_u16);
impl_mat_element!(i32, MI_INT32, MX_INT32_CLASS, write_i32, read_i32);
impl_mat_element!(u32, MI_UINT32, MX_UINT32_CLASS, write_u32, read_u32);
impl_mat_element!(i64, MI_INT64, MX_INT64_CLASS, write_i64, read_i64);
impl_mat_element!(u64, MI_UINT64, MX_UINT64_CLASS, write_u64, read_u64);
impl_mat_element!(f32, MI_SINGLE, MX_SINGLE_CLASS, write_f32, read_f32);
impl_mat_element!(f64, MI_DOUBLE, MX_DOUBLE_CLASS, write_f64, read_f64);

impl MatElement for i8 {
    const DATA_TYPE: u32 = MI_INT8;
    const CLASS: u8 = MX_INT8_CLASS;
    const SIZE: usize = 1;

    fn write_le<W: Write>(self, writer: &mut W) -> io::Result<()> {
        writer.write_i8(self)
    }

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_i8()
    }
}

impl MatElement for u8 {
    const DATA_TYPE: u32 = MI_UINT8;
    const CLASS: u8 = MX_UINT8_CLASS;
    const SIZE: usize = 1;

    fn write_le<W: Write>(self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(self)
    }

    fn read_le<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u8()
    }
}

/// 변수 하나를 담은 .mat 파일 쓰기
///
/// # Arguments
/// * `writer` - 출력 대상 (버퍼링은 호출자가 담당)
/// * `name` - 변수 이름
/// * `payload` - 기록할 배열
pub fn write_mat<W: Write>(mut writer: W, name: &str, payload: &ArrayPayload) -> Result<(), MatError> {
    let dims = encode_dims(payload.shape())?;
    write_header(&mut writer)?;

    let written = match payload {
        ArrayPayload::Bool(arr) => {
            let bytes = arr.map(|&b| b as u8);
            write_real(&mut writer, name, &dims, &bytes, FLAG_LOGICAL)
        }
        ArrayPayload::Int8(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::UInt8(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Int16(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::UInt16(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Int32(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::UInt32(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Int64(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::UInt64(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Float32(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Float64(arr) => write_real(&mut writer, name, &dims, arr, 0),
        ArrayPayload::Complex64(arr) => write_complex(&mut writer, name, &dims, arr),
        ArrayPayload::Complex128(arr) => write_complex(&mut writer, name, &dims, arr),
    };
    written?;

    writer.flush()?;
    Ok(())
}

fn encode_dims(shape: &[usize]) -> Result<Vec<i32>, MatError> {
    mat_dims(shape)
        .into_iter()
        .map(|d| i32::try_from(d).map_err(|_| MatError::DimensionTooLarge(d)))
        .collect()
}

fn write_header<W: Write>(writer: &mut W) -> Result<(), MatError> {
    let mut text = format!(
        "MATLAB 5.0 MAT-file, written by npy2mat {}",
        env!("CARGO_PKG_VERSION")
    )
    .into_bytes();
    text.resize(HEADER_TEXT_LEN, b' ');

    writer.write_all(&text)?;
    writer.write_all(&[0u8; 8])?;
    writer.write_u16::<LittleEndian>(VERSION)?;
    writer.write_all(ENDIAN_INDICATOR)?;
    Ok(())
}

fn write_real<W: Write, T: MatElement>(
    writer: &mut W,
    name: &str,
    dims: &[i32],
    arr: &ArrayD<T>,
    flags: u32,
) -> Result<(), MatError> {
    let data_len = checked_data_len(arr.len(), T::SIZE)?;
    let body_len = header_subelements_len(name, dims) + element_len(data_len);

    write_matrix_start(writer, body_len, T::CLASS, flags, dims, name)?;
    write_tag(writer, T::DATA_TYPE, data_len)?;
    // 열 우선 순서: 전치 배열의 논리 순서
    for &value in arr.t().iter() {
        value.write_le(writer)?;
    }
    write_padding(writer, data_len)
}

fn write_complex<W: Write, T: MatElement>(
    writer: &mut W,
    name: &str,
    dims: &[i32],
    arr: &ArrayD<Complex<T>>,
) -> Result<(), MatError> {
    let data_len = checked_data_len(arr.len(), T::SIZE)?;
    let body_len = header_subelements_len(name, dims) + 2 * element_len(data_len);

    write_matrix_start(writer, body_len, T::CLASS, FLAG_COMPLEX, dims, name)?;

    write_tag(writer, T::DATA_TYPE, data_len)?;
    for value in arr.t().iter() {
        value.re.write_le(writer)?;
    }
    write_padding(writer, data_len)?;

    write_tag(writer, T::DATA_TYPE, data_len)?;
    for value in arr.t().iter() {
        value.im.write_le(writer)?;
    }
    write_padding(writer, data_len)
}

fn checked_data_len(len: usize, size: usize) -> Result<usize, MatError> {
    let bytes = (len as u64).saturating_mul(size as u64);
    // 태그와 다른 서브요소가 들어갈 여유를 남겨 둔다
    if bytes > u32::MAX as u64 - 1024 {
        return Err(MatError::ElementTooLarge(bytes));
    }
    Ok(bytes as usize)
}

/// 배열 플래그 + 차원 + 이름 서브요소 크기
fn header_subelements_len(name: &str, dims: &[i32]) -> usize {
    element_len(8) + element_len(4 * dims.len()) + name_element_len(name.as_bytes())
}

fn write_matrix_start<W: Write>(
    writer: &mut W,
    body_len: usize,
    class: u8,
    flags: u32,
    dims: &[i32],
    name: &str,
) -> Result<(), MatError> {
    let body_len = u32::try_from(body_len).map_err(|_| MatError::ElementTooLarge(body_len as u64))?;
    writer.write_u32::<LittleEndian>(MI_MATRIX)?;
    writer.write_u32::<LittleEndian>(body_len)?;

    write_tag(writer, MI_UINT32, 8)?;
    writer.write_u32::<LittleEndian>(flags | class as u32)?;
    writer.write_u32::<LittleEndian>(0)?;

    write_tag(writer, MI_INT32, 4 * dims.len())?;
    for &d in dims {
        writer.write_i32::<LittleEndian>(d)?;
    }
    write_padding(writer, 4 * dims.len())?;

    let name = name.as_bytes();
    if (1..=4).contains(&name.len()) {
        writer.write_u32::<LittleEndian>(((name.len() as u32) << 16) | MI_INT8)?;
        let mut packed = [0u8; 4];
        packed[..name.len()].copy_from_slice(name);
        writer.write_all(&packed)?;
    } else {
        write_tag(writer, MI_INT8, name.len())?;
        writer.write_all(name)?;
        write_padding(writer, name.len())?;
    }
    Ok(())
}

fn write_tag<W: Write>(writer: &mut W, data_type: u32, len: usize) -> Result<(), MatError> {
    writer.write_u32::<LittleEndian>(data_type)?;
    writer.write_u32::<LittleEndian>(len as u32)?;
    Ok(())
}

fn write_padding<W: Write>(writer: &mut W, len: usize) -> Result<(), MatError> {
    writer.write_all(&[0u8; 8][..padding(len)])?;
    Ok(())
}

/// .mat 파일의 모든 변수 읽기
///
/// 이 모듈이 쓰는 형식(비압축, little-endian, 숫자/논리 배열)만 지원합니다.
pub fn read_mat<R: Read>(mut reader: R) -> Result<Vec<MatVariable>, MatError> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|_| MatError::Header("헤더가 128바이트보다 짧습니다".to_string()))?;
    if &header[126..128] != ENDIAN_INDICATOR {
        return Err(MatError::Header(
            "little-endian 'IM' 표시가 없습니다".to_string(),
        ));
    }
    if u16::from_le_bytes([header[124], header[125]]) != VERSION {
        return Err(MatError::Header("버전이 0x0100이 아닙니다".to_string()));
    }

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    let mut cursor = Cursor::new(&rest[..]);
    let mut variables = Vec::new();

    while (cursor.position() as usize) < rest.len() {
        let data_type = cursor.read_u32::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let start = cursor.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= rest.len())
            .ok_or_else(|| MatError::Malformed("데이터 요소가 파일 끝을 넘습니다".to_string()))?;

        match data_type {
            MI_MATRIX => variables.push(read_matrix(&rest[start..end])?),
            MI_COMPRESSED => return Err(MatError::Compressed),
            _ => {}
        }
        cursor.set_position((end + padding(len).min(rest.len() - end)) as u64);
    }

    Ok(variables)
}

/// 서브요소 하나 (태그 해석 후의 타입과 내용)
struct SubElement<'a> {
    data_type: u32,
    data: &'a [u8],
}

fn read_subelement<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<SubElement<'a>, MatError> {
    let buf: &'a [u8] = *cursor.get_ref();
    let first = cursor.read_u32::<LittleEndian>()?;
    let start = cursor.position() as usize;

    if first >> 16 != 0 {
        // small data element: 타입과 크기가 4바이트에 함께 들어 있음
        let len = (first >> 16) as usize;
        if len > 4 || start + 4 > buf.len() {
            return Err(MatError::Malformed("small data element 크기 오류".to_string()));
        }
        cursor.set_position((start + 4) as u64);
        return Ok(SubElement {
            data_type: first & 0xFFFF,
            data: &buf[start..start + len],
        });
    }

    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let start = cursor.position() as usize;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| MatError::Malformed("서브요소가 행렬 끝을 넘습니다".to_string()))?;
    cursor.set_position((end + padding(len)).min(buf.len()) as u64);

    Ok(SubElement {
        data_type: first,
        data: &buf[start..end],
    })
}

fn read_matrix(body: &[u8]) -> Result<MatVariable, MatError> {
    let mut cursor = Cursor::new(body);

    let flags = read_subelement(&mut cursor)?;
    if flags.data_type != MI_UINT32 || flags.data.len() != 8 {
        return Err(MatError::Malformed("배열 플래그 서브요소 오류".to_string()));
    }
    let flag_word = u32::from_le_bytes([flags.data[0], flags.data[1], flags.data[2], flags.data[3]]);
    let class = (flag_word & 0xFF) as u8;
    let is_complex = flag_word & FLAG_COMPLEX != 0;
    let is_logical = flag_word & FLAG_LOGICAL != 0;

    let dims_element = read_subelement(&mut cursor)?;
    if dims_element.data_type != MI_INT32 || dims_element.data.len() % 4 != 0 {
        return Err(MatError::Malformed("차원 서브요소 오류".to_string()));
    }
    let dims = dims_element
        .data
        .chunks_exact(4)
        .map(|c| {
            let d = i32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            usize::try_from(d).map_err(|_| MatError::Malformed(format!("음수 차원: {}", d)))
        })
        .collect::<Result<Vec<usize>, MatError>>()?;

    let name_element = read_subelement(&mut cursor)?;
    if name_element.data_type != MI_INT8 {
        return Err(MatError::Malformed("이름 서브요소 오류".to_string()));
    }
    let name = String::from_utf8_lossy(name_element.data).into_owned();

    let data = match (class, is_complex, is_logical) {
        (MX_UINT8_CLASS, false, true) => {
            let values: ArrayD<u8> = read_real(&mut cursor, &dims)?;
            ArrayPayload::Bool(values.mapv(|v| v != 0))
        }
        (MX_INT8_CLASS, false, _) => ArrayPayload::Int8(read_real(&mut cursor, &dims)?),
        (MX_UINT8_CLASS, false, _) => ArrayPayload::UInt8(read_real(&mut cursor, &dims)?),
        (MX_INT16_CLASS, false, _) => ArrayPayload::Int16(read_real(&mut cursor, &dims)?),
        (MX_UINT16_CLASS, false, _) => ArrayPayload::UInt16(read_real(&mut cursor, &dims)?),
        (MX_INT32_CLASS, false, _) => ArrayPayload::Int32(read_real(&mut cursor, &dims)?),
        (MX_UINT32_CLASS, false, _) => ArrayPayload::UInt32(read_real(&mut cursor, &dims)?),
        (MX_INT64_CLASS, false, _) => ArrayPayload::Int64(read_real(&mut cursor, &dims)?),
        (MX_UINT64_CLASS, false, _) => ArrayPayload::UInt64(read_real(&mut cursor, &dims)?),
        (MX_SINGLE_CLASS, false, _) => ArrayPayload::Float32(read_real(&mut cursor, &dims)?),
        (MX_DOUBLE_CLASS, false, _) => ArrayPayload::Float64(read_real(&mut cursor, &dims)?),
        (MX_SINGLE_CLASS, true, _) => ArrayPayload::Complex64(read_complex(&mut cursor, &dims)?),
        (MX_DOUBLE_CLASS, true, _) => ArrayPayload::Complex128(read_complex(&mut cursor, &dims)?),
        (other, _, _) => return Err(MatError::UnsupportedClass(other)),
    };

    Ok(MatVariable { name, data })
}

fn read_values<T: MatElement>(cursor: &mut Cursor<&[u8]>, count: usize) -> Result<Vec<T>, MatError> {
    let element = read_subelement(cursor)?;
    if element.data_type != T::DATA_TYPE {
        return Err(MatError::Malformed(format!(
            "데이터 타입 {}이(가) 배열 클래스와 맞지 않습니다",
            element.data_type
        )));
    }
    if element.data.len() != count * T::SIZE {
        return Err(MatError::Malformed(format!(
            "데이터 크기 불일치 (필요: {} 바이트, 실제: {} 바이트)",
            count * T::SIZE,
            element.data.len()
        )));
    }

    let mut reader = element.data;
    (0..count)
        .map(|_| T::read_le(&mut reader).map_err(MatError::from))
        .collect()
}

fn read_real<T: MatElement>(cursor: &mut Cursor<&[u8]>, dims: &[usize]) -> Result<ArrayD<T>, MatError> {
    let count = dims.iter().product();
    let values = read_values::<T>(cursor, count)?;
    ArrayD::from_shape_vec(IxDyn(dims).f(), values).map_err(|e| MatError::Malformed(e.to_string()))
}

fn read_complex<T: MatElement>(
    cursor: &mut Cursor<&[u8]>,
    dims: &[usize],
) -> Result<ArrayD<Complex<T>>, MatError> {
    let count = dims.iter().product();
    let re = read_values::<T>(cursor, count)?;
    let im = read_values::<T>(cursor, count)?;
    let values = re.into_iter().zip(im).map(|(re, im)| Complex::new(re, im)).collect();
    ArrayD::from_shape_vec(IxDyn(dims).f(), values).map_err(|e| MatError::Malformed(e.to_string()))
}
