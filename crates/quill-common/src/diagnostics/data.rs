use super::{DiagnosticCategory, DiagnosticMessage};

pub mod diagnostic_codes {
    // Name resolution
    pub const NAME_UNRESOLVABLE: u32 = 1001;
    pub const NAME_MISSING: u32 = 1002;
    pub const NAME_AMBIGUOUS: u32 = 1003;
    pub const TYPEDEF_UNEXPECTED: u32 = 1004;
    pub const NOT_CLASS_TYPE: u32 = 1005;
    pub const NAME_UNRESOLVABLE_FORMAL: u32 = 1006;

    // Flow analysis
    pub const VAR_DEFINED: u32 = 2001;
    pub const VAR_UNASSIGNED: u32 = 2002;
    pub const VAR_UNDEFINED: u32 = 2003;
    pub const VAR_ASSIGNMENT_ILLEGAL: u32 = 2004;
    pub const NARROWING_CONFLICT: u32 = 2005;
    pub const UNREACHABLE_CODE: u32 = 2006;
    pub const MISSING_JUMP_TARGET: u32 = 2007;
    pub const NULLABLE_ACCESS: u32 = 2008;

    // Compiler
    pub const INFINITE_RESOLVE_LOOP: u32 = 3001;
    pub const INTERNAL_ERROR: u32 = 3002;
    pub const TOO_MANY_ERRORS: u32 = 3003;
}

pub mod diagnostic_messages {
    pub const NAME_UNRESOLVABLE: &str = "Unable to resolve name \"{0}\".";
    pub const NAME_MISSING: &str = "Name \"{0}\" is missing from \"{1}\".";
    pub const NAME_AMBIGUOUS: &str = "Name \"{0}\" is ambiguous.";
    pub const TYPEDEF_UNEXPECTED: &str =
        "Typedef \"{0}\" is not allowed as a member of a formal type.";
    pub const NOT_CLASS_TYPE: &str = "\"{0}\" does not name a class or a formal type.";
    pub const NAME_UNRESOLVABLE_FORMAL: &str =
        "Unable to resolve name \"{0}\": the constraint of \"{1}\" never resolved.";
    pub const VAR_DEFINED: &str = "Variable \"{0}\" is already defined.";
    pub const VAR_UNASSIGNED: &str = "Variable \"{0}\" is not definitely assigned.";
    pub const VAR_UNDEFINED: &str = "Variable \"{0}\" is not defined.";
    pub const VAR_ASSIGNMENT_ILLEGAL: &str = "Variable \"{0}\" cannot be assigned.";
    pub const NARROWING_CONFLICT: &str =
        "Variable \"{0}\" cannot be narrowed to a type that is not a subtype of its declared type.";
    pub const UNREACHABLE_CODE: &str = "Unreachable code in \"{0}\".";
    pub const MISSING_JUMP_TARGET: &str = "No enclosing target for \"{0}\".";
    pub const NULLABLE_ACCESS: &str = "Variable \"{0}\" may be Null here.";
    pub const INFINITE_RESOLVE_LOOP: &str = "Unable to resolve \"{0}\": the compiler did not converge.";
    pub const INTERNAL_ERROR: &str = "Internal compiler error: {0}";
    pub const TOO_MANY_ERRORS: &str = "Too many errors; compilation aborted after {0} errors.";
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: diagnostic_codes::NAME_UNRESOLVABLE,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NAME_UNRESOLVABLE,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NAME_MISSING,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NAME_MISSING,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NAME_AMBIGUOUS,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NAME_AMBIGUOUS,
    },
    DiagnosticMessage {
        code: diagnostic_codes::TYPEDEF_UNEXPECTED,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::TYPEDEF_UNEXPECTED,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NOT_CLASS_TYPE,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NOT_CLASS_TYPE,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NAME_UNRESOLVABLE_FORMAL,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NAME_UNRESOLVABLE_FORMAL,
    },
    DiagnosticMessage {
        code: diagnostic_codes::VAR_DEFINED,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::VAR_DEFINED,
    },
    DiagnosticMessage {
        code: diagnostic_codes::VAR_UNASSIGNED,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::VAR_UNASSIGNED,
    },
    DiagnosticMessage {
        code: diagnostic_codes::VAR_UNDEFINED,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::VAR_UNDEFINED,
    },
    DiagnosticMessage {
        code: diagnostic_codes::VAR_ASSIGNMENT_ILLEGAL,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::VAR_ASSIGNMENT_ILLEGAL,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NARROWING_CONFLICT,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NARROWING_CONFLICT,
    },
    DiagnosticMessage {
        code: diagnostic_codes::UNREACHABLE_CODE,
        category: DiagnosticCategory::Warning,
        message: diagnostic_messages::UNREACHABLE_CODE,
    },
    DiagnosticMessage {
        code: diagnostic_codes::MISSING_JUMP_TARGET,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::MISSING_JUMP_TARGET,
    },
    DiagnosticMessage {
        code: diagnostic_codes::NULLABLE_ACCESS,
        category: DiagnosticCategory::Error,
        message: diagnostic_messages::NULLABLE_ACCESS,
    },
    DiagnosticMessage {
        code: diagnostic_codes::INFINITE_RESOLVE_LOOP,
        category: DiagnosticCategory::Fatal,
        message: diagnostic_messages::INFINITE_RESOLVE_LOOP,
    },
    DiagnosticMessage {
        code: diagnostic_codes::INTERNAL_ERROR,
        category: DiagnosticCategory::Fatal,
        message: diagnostic_messages::INTERNAL_ERROR,
    },
    DiagnosticMessage {
        code: diagnostic_codes::TOO_MANY_ERRORS,
        category: DiagnosticCategory::Fatal,
        message: diagnostic_messages::TOO_MANY_ERRORS,
    },
];
