//! 子网格定义

use std::ops::Range;

/// 子网格：索引缓冲中的一段连续三角形，使用同一材质
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub begin_index: u32,
    pub index_count: u32,
    pub material_id: usize,
}

impl SubMesh {
    pub fn new(begin_index: u32, index_count: u32, material_id: usize) -> Self {
        Self { begin_index, index_count, material_id }
    }

    pub fn index_range(&self) -> Range<u32> {
        self.begin_index..self.begin_index.saturating_add(self.index_count)
    }
}

/// 按材质顺序把每个材质的索引数切分为连续的子网格
pub fn split_submeshes(index_counts: impl IntoIterator<Item = u32>) -> Vec<SubMesh> {
    let mut begin = 0u32;
    index_counts
        .into_iter()
        .enumerate()
        .map(|(material_id, count)| {
            let submesh = SubMesh::new(begin, count, material_id);
            begin = begin.saturating_add(count);
            submesh
        })
        .collect()
}

/// 返回第一个超出索引缓冲长度的子网格
pub fn find_out_of_range(submeshes: &[SubMesh], index_len: usize) -> Option<&SubMesh> {
    submeshes
        .iter()
        .find(|s| s.begin_index as u64 + s.index_count as u64 > index_len as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_submeshes_is_contiguous() {
        let submeshes = split_submeshes([6, 3, 0, 12]);
        assert_eq!(submeshes.len(), 4);
        assert_eq!(submeshes[1].index_range(), 6..9);
        assert_eq!(submeshes[2].index_count, 0);
        assert_eq!(submeshes[3], SubMesh::new(9, 12, 3));
    }

    #[test]
    fn test_find_out_of_range() {
        let submeshes = split_submeshes([3, 3]);
        assert!(find_out_of_range(&submeshes, 6).is_none());
        assert_eq!(find_out_of_range(&submeshes, 5), Some(&submeshes[1]));

        // 累计索引数超过 u32 不回绕
        let huge = split_submeshes([u32::MAX, 3]);
        assert_eq!(huge[1].begin_index, u32::MAX);
        assert_eq!(find_out_of_range(&huge, 3), Some(&huge[0]));
        assert!(find_out_of_range(&huge[1..], 3).is_some());
    }
}
