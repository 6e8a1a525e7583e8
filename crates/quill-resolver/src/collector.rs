use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};
use quill_decl::{DeclId, DeclKind, DeclTree, Identity, Resolution, ResolutionCollector};

use crate::resolver::{Goal, Target, TypeMode};

/// Receives the match for one name segment and applies the type-mode rules.
pub(crate) struct SegmentCollector<'a> {
    node: NodeId,
    subject: &'a str,
    segment: &'a str,
    goal: Goal,
    mode: TypeMode,
    /// The formal type the segment is being resolved under, if any.
    formal: Option<DeclId>,
    errs: &'a mut DiagnosticSink,
    pub(crate) found: Option<Target>,
}

impl<'a> SegmentCollector<'a> {
    pub(crate) fn new(
        node: NodeId,
        subject: &'a str,
        segment: &'a str,
        goal: Goal,
        mode: TypeMode,
        formal: Option<DeclId>,
        errs: &'a mut DiagnosticSink,
    ) -> Self {
        Self {
            node,
            subject,
            segment,
            goal,
            mode,
            formal,
            errs,
            found: None,
        }
    }

    fn log(&mut self, code: u32, args: &[&str]) -> Resolution {
        self.errs.log_code(code, self.node, self.subject, args);
        Resolution::Error
    }
}

impl ResolutionCollector for SegmentCollector<'_> {
    fn resolved_decl(&mut self, tree: &DeclTree, decl: DeclId) -> Resolution {
        let Some(entity) = tree.get(decl) else {
            return Resolution::Unknown;
        };
        let mut mode = self.mode;
        let mut identity = Identity::Decl(decl);

        if mode == TypeMode::Value {
            if self.goal == Goal::Type {
                if entity.is_formal_type() {
                    mode = TypeMode::FormalType;
                } else if entity.kind == DeclKind::Typedef {
                    mode = TypeMode::Type;
                }
            }
        } else {
            match entity.kind {
                DeclKind::Typedef if mode == TypeMode::FormalType => {
                    let segment = self.segment;
                    return self.log(diagnostic_codes::TYPEDEF_UNEXPECTED, &[segment]);
                }
                DeclKind::Property | DeclKind::TypeParameter if entity.is_formal_type() => {
                    if mode == TypeMode::FormalType {
                        if let Some(formal) = self.formal {
                            identity = Identity::FormalChild {
                                formal,
                                name: entity.name.clone(),
                            };
                        }
                    } else {
                        mode = TypeMode::FormalType;
                    }
                }
                DeclKind::Property | DeclKind::Method => {
                    let owner = entity
                        .parent
                        .map(|p| tree.qualified_name(p))
                        .unwrap_or_default();
                    let segment = self.segment;
                    return self.log(diagnostic_codes::NAME_MISSING, &[segment, &owner]);
                }
                _ => {}
            }
        }

        self.found = Some(Target {
            identity,
            decl: Some(decl),
            mode,
        });
        Resolution::Resolved
    }

    fn ambiguous(&mut self, _tree: &DeclTree, name: &str, _candidates: &[DeclId]) -> Resolution {
        self.log(diagnostic_codes::NAME_AMBIGUOUS, &[name])
    }
}
