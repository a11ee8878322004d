// Copyright 2024 shardq Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// The plan node is a discriminated union rather than a virtual base with
// downcasts (§9): six exhaustive kinds, each carrying the common
// `{disabled, skipped, exec_site}` fields plus its own payload. `push_down`,
// `copy` and `optimize_exec_node` are visitors over this union rather than
// virtual methods.

use shardq_common::Predicate;

#[derive(Debug, Clone)]
pub struct ProjectionNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub cols: Vec<String>,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct SelectionNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub preds: Vec<Predicate>,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct RenameNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub new_table: String,
    pub child: Box<PlanNode>,
}

/// A `ReadTable` leaf, addressed by `(site, frag)`; `site_qualified_table`
/// of §3 is `format!("{site}.{frag}")`.
#[derive(Debug, Clone)]
pub struct ReadTableNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub site: String,
    pub frag: String,
    pub orig_logical_table: String,
    pub cols: Vec<String>,
    pub preds: Vec<Predicate>,
}

impl ReadTableNode {
    pub fn site_qualified_table(&self) -> String {
        format!("{}.{}", self.site, self.frag)
    }
}

#[derive(Debug, Clone)]
pub struct NJoinNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub join_cols: Vec<String>,
    pub children: Vec<PlanNode>,
    pub retag_as: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnionNode {
    pub disabled: bool,
    pub skipped: bool,
    pub exec_site: Option<String>,
    pub children: Vec<PlanNode>,
    pub retag_as: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    Projection(ProjectionNode),
    Selection(SelectionNode),
    Rename(RenameNode),
    ReadTable(ReadTableNode),
    NJoin(NJoinNode),
    Union(UnionNode),
}

impl PlanNode {
    pub fn projection(cols: Vec<String>, child: PlanNode) -> Self {
        PlanNode::Projection(ProjectionNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            cols,
            child: Box::new(child),
        })
    }

    pub fn selection(preds: Vec<Predicate>, child: PlanNode) -> Self {
        PlanNode::Selection(SelectionNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            preds,
            child: Box::new(child),
        })
    }

    pub fn rename(new_table: impl Into<String>, child: PlanNode) -> Self {
        PlanNode::Rename(RenameNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            new_table: new_table.into(),
            child: Box::new(child),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn read_table(
        site: impl Into<String>,
        frag: impl Into<String>,
        orig_logical_table: impl Into<String>,
        cols: Vec<String>,
        preds: Vec<Predicate>,
    ) -> Self {
        PlanNode::ReadTable(ReadTableNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            site: site.into(),
            frag: frag.into(),
            orig_logical_table: orig_logical_table.into(),
            cols,
            preds,
        })
    }

    pub fn njoin(join_cols: Vec<String>, children: Vec<PlanNode>, retag_as: Option<String>) -> Self {
        PlanNode::NJoin(NJoinNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            join_cols,
            children,
            retag_as,
        })
    }

    pub fn union(children: Vec<PlanNode>, retag_as: Option<String>) -> Self {
        PlanNode::Union(UnionNode {
            disabled: false,
            skipped: false,
            exec_site: None,
            children,
            retag_as,
        })
    }

    pub fn disabled(&self) -> bool {
        match self {
            PlanNode::Projection(n) => n.disabled,
            PlanNode::Selection(n) => n.disabled,
            PlanNode::Rename(n) => n.disabled,
            PlanNode::ReadTable(n) => n.disabled,
            PlanNode::NJoin(n) => n.disabled,
            PlanNode::Union(n) => n.disabled,
        }
    }

    pub fn set_disabled(&mut self, v: bool) {
        match self {
            PlanNode::Projection(n) => n.disabled = v,
            PlanNode::Selection(n) => n.disabled = v,
            PlanNode::Rename(n) => n.disabled = v,
            PlanNode::ReadTable(n) => n.disabled = v,
            PlanNode::NJoin(n) => n.disabled = v,
            PlanNode::Union(n) => n.disabled = v,
        }
    }

    pub fn skipped(&self) -> bool {
        match self {
            PlanNode::Projection(n) => n.skipped,
            PlanNode::Selection(n) => n.skipped,
            PlanNode::Rename(n) => n.skipped,
            PlanNode::ReadTable(n) => n.skipped,
            PlanNode::NJoin(n) => n.skipped,
            PlanNode::Union(n) => n.skipped,
        }
    }

    pub fn set_skipped(&mut self, v: bool) {
        match self {
            PlanNode::Projection(n) => n.skipped = v,
            PlanNode::Selection(n) => n.skipped = v,
            PlanNode::Rename(n) => n.skipped = v,
            PlanNode::ReadTable(n) => n.skipped = v,
            PlanNode::NJoin(n) => n.skipped = v,
            PlanNode::Union(n) => n.skipped = v,
        }
    }

    pub fn exec_site(&self) -> Option<&str> {
        match self {
            PlanNode::Projection(n) => n.exec_site.as_deref(),
            PlanNode::Selection(n) => n.exec_site.as_deref(),
            PlanNode::Rename(n) => n.exec_site.as_deref(),
            PlanNode::ReadTable(n) => n.exec_site.as_deref(),
            PlanNode::NJoin(n) => n.exec_site.as_deref(),
            PlanNode::Union(n) => n.exec_site.as_deref(),
        }
    }

    pub fn set_exec_site(&mut self, site: Option<String>) {
        match self {
            PlanNode::Projection(n) => n.exec_site = site,
            PlanNode::Selection(n) => n.exec_site = site,
            PlanNode::Rename(n) => n.exec_site = site,
            PlanNode::ReadTable(n) => n.exec_site = site,
            PlanNode::NJoin(n) => n.exec_site = site,
            PlanNode::Union(n) => n.exec_site = site,
        }
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Projection(n) => vec![n.child.as_ref()],
            PlanNode::Selection(n) => vec![n.child.as_ref()],
            PlanNode::Rename(n) => vec![n.child.as_ref()],
            PlanNode::ReadTable(_) => vec![],
            PlanNode::NJoin(n) => n.children.iter().collect(),
            PlanNode::Union(n) => n.children.iter().collect(),
        }
    }
}
