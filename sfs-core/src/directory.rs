//! The directory graph: every inode, file or directory, owns one node in
//! a child/sibling tree, persisted as a single data block per node. The
//! in-memory graph is an arena keyed by inode number, sidestepping the
//! ownership cycles a pointer-based tree would need.

use std::collections::HashMap;

use crate::block_device::BlockDevice;
use crate::byte_buffer::ByteBuffer;
use crate::error::SfsResult;
use crate::inode::Inode;
use crate::layout::BLOCK_SIZE;

/// Sentinel written in place of a missing sibling/child inode reference.
const NO_ENTRY: u16 = u16::MAX;

pub struct DirNode {
    pub ino: u64,
    pub name: String,
    pub parent: Option<u64>,
    pub sibling: Option<u64>,
    pub child: Option<u64>,
}

pub struct DirectoryGraph {
    nodes: HashMap<u64, DirNode>,
}

impl DirectoryGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn get(&self, ino: u64) -> Option<&DirNode> {
        self.nodes.get(&ino)
    }

    pub fn contains(&self, ino: u64) -> bool {
        self.nodes.contains_key(&ino)
    }

    pub fn allocate(&mut self, ino: u64, name: String) {
        self.nodes.insert(
            ino,
            DirNode {
                ino,
                name,
                parent: None,
                sibling: None,
                child: None,
            },
        );
    }

    pub fn remove(&mut self, ino: u64) -> Option<DirNode> {
        self.nodes.remove(&ino)
    }

    fn last_sibling(&self, start: u64) -> u64 {
        let mut cur = start;
        while let Some(next) = self.nodes.get(&cur).and_then(|n| n.sibling) {
            cur = next;
        }
        cur
    }

    /// Inserts `child` under `parent`, either as its first child or at the
    /// end of its sibling chain. Returns the ino whose on-disk entry now
    /// needs to be re-persisted (the parent, if it had no children, or the
    /// previous last sibling).
    pub fn insert_child(&mut self, parent: u64, child: u64) -> u64 {
        let persisted = match self.nodes.get(&parent).and_then(|n| n.child) {
            None => {
                self.nodes.get_mut(&parent).unwrap().child = Some(child);
                parent
            }
            Some(first_child) => {
                let last = self.last_sibling(first_child);
                self.nodes.get_mut(&last).unwrap().sibling = Some(child);
                last
            }
        };
        self.nodes.get_mut(&child).unwrap().parent = Some(parent);
        persisted
    }

    /// Splices `target` out of its parent's child/sibling chain. Returns the
    /// ino whose on-disk entry now needs to be re-persisted, if any (the
    /// parent, if `target` was its first child, or the preceding sibling).
    pub fn detach(&mut self, target: u64) -> Option<u64> {
        let parent = self.nodes.get(&target)?.parent?;
        let next_sibling = self.nodes.get(&target)?.sibling;
        let first_child = self.nodes.get(&parent)?.child?;

        if first_child == target {
            self.nodes.get_mut(&parent).unwrap().child = next_sibling;
            return Some(parent);
        }

        let mut prev = first_child;
        loop {
            let prev_sibling = self.nodes.get(&prev)?.sibling;
            match prev_sibling {
                Some(s) if s == target => {
                    self.nodes.get_mut(&prev).unwrap().sibling = next_sibling;
                    return Some(prev);
                }
                Some(s) => prev = s,
                None => return None,
            }
        }
    }

    /// Persists `ino`'s own entry into `block`, the absolute block number
    /// reserved for its directory-graph entry.
    pub fn save(&self, ino: u64, block: u64, dev: &mut BlockDevice) -> SfsResult<()> {
        let node = self
            .nodes
            .get(&ino)
            .expect("directory node must exist to be saved");
        let mut buf = ByteBuffer::new(BLOCK_SIZE);
        buf.write_string(&node.name);
        buf.write_u16(node.ino as u16);
        buf.write_u16(node.sibling.map(|s| s as u16).unwrap_or(NO_ENTRY));
        buf.write_u16(node.child.map(|c| c as u16).unwrap_or(NO_ENTRY));
        dev.write_block(block, &buf.into_bytes())?;
        Ok(())
    }

    /// Recursively loads `ino`'s subtree (itself, its sibling chain, and
    /// each child's own subtree) from disk, in the same pre-order a fresh
    /// `save` walk would visit it.
    pub fn load(&mut self, ino: u64, inodes: &[Inode], dev: &mut BlockDevice) -> SfsResult<()> {
        let block_link = inodes[ino as usize].block_links[crate::layout::DIR_ENTRY_SLOT];
        if block_link == -1 {
            return Ok(());
        }

        let mut raw = vec![0u8; BLOCK_SIZE];
        dev.read_block(block_link as u64, &mut raw)?;
        let mut reader = ByteBuffer::from_bytes(raw);
        let name = reader.read_string();
        let _self_ino = reader.read_u16();
        let sibling_ino = reader.read_u16();
        let child_ino = reader.read_u16();

        if let Some(node) = self.nodes.get_mut(&ino) {
            node.name = name;
        }

        if sibling_ino != NO_ENTRY {
            let sib = sibling_ino as u64;
            if !self.contains(sib) {
                self.allocate(sib, String::new());
            }
            self.nodes.get_mut(&ino).unwrap().sibling = Some(sib);
            self.load(sib, inodes, dev)?;
        }
        if child_ino != NO_ENTRY {
            let ch = child_ino as u64;
            if !self.contains(ch) {
                self.allocate(ch, String::new());
            }
            self.nodes.get_mut(&ino).unwrap().child = Some(ch);
            self.load(ch, inodes, dev)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_and_detach_only_child() {
        let mut g = DirectoryGraph::new();
        g.allocate(0, "/".to_string());
        g.allocate(1, "a".to_string());
        let persisted = g.insert_child(0, 1);
        assert_eq!(persisted, 0);
        assert_eq!(g.get(0).unwrap().child, Some(1));

        let persisted = g.detach(1);
        assert_eq!(persisted, Some(0));
        assert_eq!(g.get(0).unwrap().child, None);
    }

    #[test]
    fn insert_and_detach_middle_sibling() {
        let mut g = DirectoryGraph::new();
        g.allocate(0, "/".to_string());
        g.allocate(1, "a".to_string());
        g.allocate(2, "b".to_string());
        g.allocate(3, "c".to_string());
        g.insert_child(0, 1);
        g.insert_child(0, 2);
        g.insert_child(0, 3);

        let persisted = g.detach(2);
        assert_eq!(persisted, Some(1));
        assert_eq!(g.get(1).unwrap().sibling, Some(3));
    }
}
