//! YUV 4:2:0 图像平面.
//!
//! 解码器的重建输出与编码器的输入源都使用 [`Picture`], 参考帧同样以此形式传递.

use crate::{AvcError, AvcResult};

/// 单个采样平面 (8 位采样)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    /// 宽度 (采样)
    pub width: usize,
    /// 高度 (采样)
    pub height: usize,
    /// 每行字节数
    pub stride: usize,
    /// 采样数据, 长度为 `stride * height`
    pub data: Vec<u8>,
}

impl Plane {
    /// 创建以指定值填充的平面
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            stride: width,
            data: vec![value; width * height],
        }
    }

    /// 读取 (x, y) 处的采样
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }

    /// 写入 (x, y) 处的采样
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.stride + x] = value;
    }

    /// 读取坐标钳制到平面边界内的采样
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> u8 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.get(cx, cy)
    }

    /// 获取第 y 行的切片
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// 取出以 (x0, y0) 为左上角的 N x N 块
    pub fn block<const N: usize>(&self, x0: usize, y0: usize) -> [[u8; N]; N] {
        let mut out = [[0u8; N]; N];
        for (y, row) in out.iter_mut().enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                *v = self.get(x0 + x, y0 + y);
            }
        }
        out
    }

    /// 把 N x N 块写回到以 (x0, y0) 为左上角的位置
    pub fn put_block<const N: usize>(&mut self, x0: usize, y0: usize, block: &[[u8; N]; N]) {
        for (y, row) in block.iter().enumerate() {
            let start = (y0 + y) * self.stride + x0;
            self.data[start..start + N].copy_from_slice(row);
        }
    }

    /// 以边缘复制方式扩展到更大的尺寸
    pub fn padded(&self, width: usize, height: usize) -> Self {
        let mut out = Self::filled(width, height, 0);
        for y in 0..height {
            for x in 0..width {
                out.set(x, y, self.get_clamped(x as isize, y as isize));
            }
        }
        out
    }

    /// 截取左上角 width x height 区域
    pub fn cropped(&self, width: usize, height: usize) -> Self {
        let mut out = Self::filled(width, height, 0);
        for y in 0..height {
            out.data[y * width..(y + 1) * width].copy_from_slice(&self.row(y)[..width]);
        }
        out
    }
}

/// YUV 4:2:0 图像 (色度平面宽高各为亮度的一半)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// 亮度平面
    pub luma: Plane,
    /// Cb 色度平面
    pub cb: Plane,
    /// Cr 色度平面
    pub cr: Plane,
}

impl Picture {
    /// 创建中灰 (128) 图像
    ///
    /// 宽高必须为正偶数.
    pub fn new(width: usize, height: usize) -> AvcResult<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(AvcError::InvalidArgument(format!(
                "4:2:0 图像尺寸必须为正偶数: {}x{}",
                width, height,
            )));
        }
        Ok(Self {
            luma: Plane::filled(width, height, 128),
            cb: Plane::filled(width / 2, height / 2, 128),
            cr: Plane::filled(width / 2, height / 2, 128),
        })
    }

    /// 从连续的 I420 (Y, U, V 依次排列) 数据构造
    pub fn from_i420(width: usize, height: usize, data: &[u8]) -> AvcResult<Self> {
        let mut pic = Self::new(width, height)?;
        let luma_len = width * height;
        let chroma_len = luma_len / 4;
        if data.len() != luma_len + 2 * chroma_len {
            return Err(AvcError::InvalidArgument(format!(
                "I420 数据长度不匹配: 期望 {}, 实际 {}",
                luma_len + 2 * chroma_len,
                data.len(),
            )));
        }
        pic.luma.data.copy_from_slice(&data[..luma_len]);
        pic.cb
            .data
            .copy_from_slice(&data[luma_len..luma_len + chroma_len]);
        pic.cr.data.copy_from_slice(&data[luma_len + chroma_len..]);
        Ok(pic)
    }

    /// 导出为连续的 I420 数据
    pub fn to_i420(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.luma.data.len() * 3 / 2);
        for plane in [&self.luma, &self.cb, &self.cr] {
            for y in 0..plane.height {
                out.extend_from_slice(plane.row(y));
            }
        }
        out
    }

    /// 亮度宽度
    pub fn width(&self) -> usize {
        self.luma.width
    }

    /// 亮度高度
    pub fn height(&self) -> usize {
        self.luma.height
    }

    /// 按边缘复制扩展到 width x height (需为偶数)
    pub fn padded(&self, width: usize, height: usize) -> Self {
        Self {
            luma: self.luma.padded(width, height),
            cb: self.cb.padded(width / 2, height / 2),
            cr: self.cr.padded(width / 2, height / 2),
        }
    }

    /// 截取左上角 width x height 区域 (需为偶数)
    pub fn cropped(&self, width: usize, height: usize) -> Self {
        Self {
            luma: self.luma.cropped(width, height),
            cb: self.cb.cropped(width / 2, height / 2),
            cr: self.cr.cropped(width / 2, height / 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_odd_size() {
        assert!(Picture::new(15, 16).is_err());
        assert!(Picture::new(0, 16).is_err());
        let pic = Picture::new(32, 16).unwrap();
        assert_eq!(pic.cb.width, 16);
        assert_eq!(pic.cr.height, 8);
    }

    #[test]
    fn test_i420_roundtrip() {
        let data: Vec<u8> = (0..(4 * 2 * 3 / 2)).map(|v| v as u8).collect();
        let pic = Picture::from_i420(4, 2, &data).unwrap();
        assert_eq!(pic.luma.get(3, 1), 7);
        assert_eq!(pic.cb.get(1, 0), 9);
        assert_eq!(pic.cr.get(0, 0), 10);
        assert_eq!(pic.to_i420(), data);
        assert!(Picture::from_i420(4, 2, &data[1..]).is_err());
    }

    #[test]
    fn test_pad_and_crop() {
        let mut plane = Plane::filled(2, 2, 0);
        plane.set(1, 0, 10);
        plane.set(1, 1, 20);
        let padded = plane.padded(4, 3);
        assert_eq!(padded.row(0), &[0, 10, 10, 10]);
        assert_eq!(padded.row(2), &[0, 20, 20, 20]);
        assert_eq!(padded.cropped(2, 2), plane);
    }

    #[test]
    fn test_block_access() {
        let mut plane = Plane::filled(8, 8, 0);
        let block = [[1u8, 2], [3, 4]];
        plane.put_block(4, 6, &block);
        assert_eq!(plane.block::<2>(4, 6), block);
        assert_eq!(plane.get_clamped(100, -5), 0);
        assert_eq!(plane.get_clamped(5, 100), 4);
    }
}
