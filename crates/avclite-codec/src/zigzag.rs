//! 之字形 (zig-zag) 扫描.
//!
//! 4x4 帧扫描顺序用于残差系数, 通用的 m x n 对角遍历用于任意矩阵.

/// 4x4 帧扫描: 第 i 个扫描位置对应的光栅下标 (`row * 4 + col`)
pub const ZIGZAG_4X4: [usize; 16] = [0, 1, 4, 8, 5, 2, 3, 6, 9, 12, 13, 10, 7, 11, 14, 15];

/// 把 4x4 块按扫描顺序展开
pub fn zigzag_4x4(block: &[[i32; 4]; 4]) -> [i32; 16] {
    let mut out = [0i32; 16];
    for (i, &pos) in ZIGZAG_4X4.iter().enumerate() {
        out[i] = block[pos / 4][pos % 4];
    }
    out
}

/// 把扫描顺序的系数还原为 4x4 块
///
/// `scan` 长度不足 16 时其余位置为 0.
pub fn unzigzag_4x4(scan: &[i32]) -> [[i32; 4]; 4] {
    let mut block = [[0i32; 4]; 4];
    for (&pos, &v) in ZIGZAG_4X4.iter().zip(scan) {
        block[pos / 4][pos % 4] = v;
    }
    block
}

/// m 行 n 列矩阵的之字形遍历顺序 `(row, col)`
///
/// 从左上角出发先向右, 沿反对角线交替上行和下行.
pub fn zigzag_order(rows: usize, cols: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(rows * cols);
    if rows == 0 || cols == 0 {
        return order;
    }
    let (mut r, mut c) = (0usize, 0usize);
    let mut up = true;
    for _ in 0..rows * cols {
        order.push((r, c));
        if up {
            if r == 0 || c + 1 >= cols {
                up = false;
                if c + 1 >= cols {
                    r += 1;
                } else {
                    c += 1;
                }
            } else {
                r -= 1;
                c += 1;
            }
        } else if r + 1 >= rows || c == 0 {
            up = true;
            if r + 1 >= rows {
                c += 1;
            } else {
                r += 1;
            }
        } else {
            r += 1;
            c -= 1;
        }
    }
    order
}

/// 按之字形顺序展开任意矩阵
pub fn zigzag<T: Copy>(matrix: &[Vec<T>]) -> Vec<T> {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, Vec::len);
    zigzag_order(rows, cols)
        .into_iter()
        .map(|(r, c)| matrix[r][c])
        .collect()
}

/// 把之字形序列还原为 rows x cols 矩阵
pub fn unzigzag<T: Copy + Default>(seq: &[T], rows: usize, cols: usize) -> Vec<Vec<T>> {
    let mut matrix = vec![vec![T::default(); cols]; rows];
    for ((r, c), &v) in zigzag_order(rows, cols).into_iter().zip(seq) {
        matrix[r][c] = v;
    }
    matrix
}
