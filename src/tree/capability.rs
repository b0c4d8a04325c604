use bitflags::bitflags;

bitflags! {
    /// ノードの種類が満たす構造上の契約
    ///
    /// 一つの種類が複数の契約を同時に満たします
    /// （例: 関数呼び出しは `CALL` でもあり `QUALIFIED_ACCESS` でもある）。
    /// 子スロットはそれぞれ要求する契約を宣言し、ノードの生成時に検査されます。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const DECLARATION = 1 << 0;
        const CLASS_LIKE = 1 << 1;
        const CALLABLE = 1 << 2;
        const TYPE_PARAMETERS_OWNER = 1 << 3;
        const TYPE_PARAMETER = 1 << 4;
        const VALUE_PARAMETER = 1 << 5;
        const ANNOTATED = 1 << 6;
        const ANNOTATION = 1 << 7;
        const STATEMENT = 1 << 8;
        const EXPRESSION = 1 << 9;
        const CALL = 1 << 10;
        const QUALIFIED_ACCESS = 1 << 11;
        const LOOP = 1 << 12;
        const LOOP_JUMP = 1 << 13;
        const TYPE_REF = 1 << 14;
        const TYPE_PROJECTION = 1 << 15;
        const REFERENCE = 1 << 16;
        const NAMED_REFERENCE = 1 << 17;
        const IMPORT = 1 << 18;
        const DELEGATED_CONSTRUCTOR_CALL = 1 << 19;
        const CONTROL_FLOW_GRAPH_REFERENCE = 1 << 20;
    }
}

impl Capabilities {
    pub(crate) const EXPRESSION_NODE: Capabilities = Capabilities::EXPRESSION
        .union(Capabilities::STATEMENT)
        .union(Capabilities::ANNOTATED);
    pub(crate) const CALL_NODE: Capabilities = Capabilities::EXPRESSION_NODE
        .union(Capabilities::CALL)
        .union(Capabilities::QUALIFIED_ACCESS);
    pub(crate) const ANNOTATED_TYPE_REF: Capabilities = Capabilities::TYPE_REF
        .union(Capabilities::ANNOTATED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_node_is_both_call_and_qualified_access() {
        let call = Capabilities::CALL_NODE;
        assert!(call.contains(Capabilities::CALL));
        assert!(call.contains(Capabilities::QUALIFIED_ACCESS));
        assert!(call.contains(Capabilities::EXPRESSION | Capabilities::STATEMENT));
        assert!(!call.contains(Capabilities::LOOP));
    }
}
