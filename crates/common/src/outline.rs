// Adjacency index over the flat line-item sequence.
//
// Hierarchy in a cost sheet is implied by row order plus indent. This
// module materializes parent links, child lists, and contiguous
// descendant blocks in one pass so that numbering, subtotals, moves,
// and sub-item placement all read the same structure instead of
// rescanning the sequence.
//
// Parent lookup matches the rendering rule: the nearest preceding row
// whose indent is exactly one less, even when shallower rows sit in
// between. Block ranges follow the forward rule instead: a row's block
// extends while indent stays greater than its own. The two agree on
// any well-formed sheet; on malformed indentation (skipped levels) the
// parent may fall outside the block, and movement degrades to a no-op
// rather than splicing rows apart.

use std::collections::HashMap;

use crate::types::LineItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    indents: Vec<u32>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    /// Exclusive end of each row's descendant block.
    block_ends: Vec<usize>,
}

impl Outline {
    pub fn build(items: &[LineItem]) -> Self {
        Outline::from_indents(items.iter().map(|item| item.indent).collect())
    }

    pub fn from_indents(indents: Vec<u32>) -> Self {
        let len = indents.len();
        let mut parents = vec![None; len];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut roots = Vec::new();
        let mut block_ends = vec![len; len];
        // Most recent row seen at each indent level.
        let mut last_at: HashMap<u32, usize> = HashMap::new();
        let mut stack: Vec<usize> = Vec::new();

        for (index, &indent) in indents.iter().enumerate() {
            while let Some(&top) = stack.last() {
                if indents[top] >= indent {
                    block_ends[top] = index;
                    stack.pop();
                } else {
                    break;
                }
            }
            stack.push(index);

            if indent == 0 {
                roots.push(index);
            } else if let Some(&parent) = last_at.get(&(indent - 1)) {
                parents[index] = Some(parent);
                children[parent].push(index);
            }
            last_at.insert(indent, index);
        }

        Outline {
            indents,
            parents,
            children,
            roots,
            block_ends,
        }
    }

    pub fn len(&self) -> usize {
        self.indents.len()
    }

    pub fn indent(&self, index: usize) -> u32 {
        self.indents[index]
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    /// Rows at indent 0, in sequence order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// A row with positive indent and no preceding row one level
    /// shallower. Orphans number as `?.?` and cannot be moved.
    pub fn is_orphan(&self, index: usize) -> bool {
        self.indents[index] > 0 && self.parents[index].is_none()
    }

    /// Exclusive end of the contiguous block `[index, end)` holding the
    /// row and every deeper row after it.
    pub fn block_end(&self, index: usize) -> usize {
        self.block_ends[index]
    }

    pub fn block_len(&self, index: usize) -> usize {
        self.block_ends[index] - index
    }

    pub fn prev_sibling(&self, index: usize) -> Option<usize> {
        let siblings = self.sibling_list(index)?;
        let pos = siblings.iter().position(|&i| i == index)?;
        pos.checked_sub(1).map(|prev| siblings[prev])
    }

    pub fn next_sibling(&self, index: usize) -> Option<usize> {
        let siblings = self.sibling_list(index)?;
        let pos = siblings.iter().position(|&i| i == index)?;
        siblings.get(pos + 1).copied()
    }

    fn sibling_list(&self, index: usize) -> Option<&[usize]> {
        match self.parents[index] {
            Some(parent) => Some(&self.children[parent]),
            None if self.indents[index] == 0 => Some(&self.roots),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Outline;

    fn outline(indents: &[u32]) -> Outline {
        Outline::from_indents(indents.to_vec())
    }

    #[test]
    fn links_each_row_to_the_nearest_row_one_level_up() {
        let o = outline(&[0, 1, 2, 1, 0]);

        assert_eq!(o.parent(0), None);
        assert_eq!(o.parent(1), Some(0));
        assert_eq!(o.parent(2), Some(1));
        assert_eq!(o.parent(3), Some(0));
        assert_eq!(o.parent(4), None);

        assert_eq!(o.roots(), &[0, 4]);
        assert_eq!(o.children(0), &[1, 3]);
        assert_eq!(o.children(1), &[2]);
    }

    #[test]
    fn parent_lookup_crosses_shallower_rows() {
        // The last row's nearest preceding indent-1 row is index 1,
        // even though an indent-0 row sits between them.
        let o = outline(&[0, 1, 0, 2]);

        assert_eq!(o.parent(3), Some(1));
        assert!(!o.is_orphan(3));
        // The block of index 1 still closes at the indent-0 row.
        assert_eq!(o.block_end(1), 2);
    }

    #[test]
    fn block_covers_row_and_all_deeper_rows_after_it() {
        let o = outline(&[0, 1, 2, 1, 0, 1]);

        assert_eq!(o.block_end(0), 4);
        assert_eq!(o.block_end(1), 3);
        assert_eq!(o.block_end(2), 3);
        assert_eq!(o.block_end(3), 4);
        assert_eq!(o.block_end(4), 6);
        assert_eq!(o.block_len(4), 2);
    }

    #[test]
    fn rows_that_skip_a_level_are_orphans() {
        let o = outline(&[0, 2, 0]);

        assert_eq!(o.parent(1), None);
        assert!(o.is_orphan(1));
        assert!(!o.is_orphan(0));
        // The orphan still sits inside the first root's block.
        assert_eq!(o.block_end(0), 2);
        assert_eq!(o.roots(), &[0, 2]);
    }

    #[test]
    fn sibling_lookup_walks_the_shared_parent() {
        let o = outline(&[0, 1, 1, 1, 0]);

        assert_eq!(o.prev_sibling(1), None);
        assert_eq!(o.next_sibling(1), Some(2));
        assert_eq!(o.prev_sibling(3), Some(2));
        assert_eq!(o.next_sibling(3), None);

        assert_eq!(o.prev_sibling(4), Some(0));
        assert_eq!(o.next_sibling(0), Some(4));
    }

    #[test]
    fn orphans_have_no_siblings() {
        let o = outline(&[0, 2, 2]);

        assert!(o.is_orphan(1));
        assert!(o.is_orphan(2));
        assert_eq!(o.prev_sibling(2), None);
        assert_eq!(o.next_sibling(1), None);
    }

    #[test]
    fn empty_sequence_builds_an_empty_index() {
        let o = outline(&[]);
        assert_eq!(o.len(), 0);
        assert!(o.roots().is_empty());
    }
}
